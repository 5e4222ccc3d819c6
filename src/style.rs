use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use quick_xml::Reader as XmlReader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use serde::Serialize;

use crate::error::{ProfileError, StyleError};

/// Backends the profiler knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Vector features in a spatial table.
    Postgis,
    /// Raster tiles in a spatial table. Overviews are not consulted.
    Pgraster,
}

impl SourceKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "postgis" => Some(SourceKind::Postgis),
            "pgraster" => Some(SourceKind::Pgraster),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Postgis => "postgis",
            SourceKind::Pgraster => "pgraster",
        }
    }
}

/// Connection settings taken from a datasource. Unset fields fall back to the
/// libpq environment when a connection is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialTable {
    pub table: String,
    pub geometry_field: Option<String>,
    pub raster_field: Option<String>,
    pub simplify_geometries: bool,
    pub credentials: Credentials,
}

impl SpatialTable {
    /// Name of the column holding geometries or rasters.
    pub fn spatial_column(&self) -> Option<&str> {
        self.geometry_field
            .as_deref()
            .or(self.raster_field.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Postgis(SpatialTable),
    Pgraster(SpatialTable),
    Unsupported {
        type_name: Option<String>,
        parameters: BTreeMap<String, String>,
    },
}

impl DataSource {
    pub fn from_parameters(
        layer: &str,
        mut parameters: BTreeMap<String, String>,
    ) -> Result<Self, StyleError> {
        let type_name = parameters.get("type").cloned();
        let Some(kind) = type_name.as_deref().and_then(SourceKind::from_type_name) else {
            return Ok(DataSource::Unsupported {
                type_name,
                parameters,
            });
        };
        let table = parameters.remove("table").ok_or_else(|| {
            StyleError::Invalid(format!(
                "layer {layer}: {} datasource requires a table parameter",
                kind.as_str()
            ))
        })?;
        let port = match parameters.get("port") {
            Some(value) => Some(value.trim().parse::<u16>().map_err(|_| {
                StyleError::Invalid(format!("layer {layer}: invalid port {value}"))
            })?),
            None => None,
        };
        let spatial = SpatialTable {
            table,
            geometry_field: non_empty(parameters.remove("geometry_field")),
            raster_field: non_empty(parameters.remove("raster_field")),
            simplify_geometries: parameters.get("simplify_geometries").map(String::as_str)
                == Some("true"),
            credentials: Credentials {
                host: non_empty(parameters.remove("host")),
                port,
                user: non_empty(parameters.remove("user")),
                password: parameters.remove("password"),
                dbname: non_empty(parameters.remove("dbname")),
            },
        };
        Ok(match kind {
            SourceKind::Postgis => DataSource::Postgis(spatial),
            SourceKind::Pgraster => DataSource::Pgraster(spatial),
        })
    }

    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            DataSource::Postgis(_) => Some(SourceKind::Postgis),
            DataSource::Pgraster(_) => Some(SourceKind::Pgraster),
            DataSource::Unsupported { .. } => None,
        }
    }

    pub fn spatial_table(&self) -> Option<&SpatialTable> {
        match self {
            DataSource::Postgis(table) | DataSource::Pgraster(table) => Some(table),
            DataSource::Unsupported { .. } => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub active: bool,
    pub min_scale_denominator: f64,
    pub max_scale_denominator: f64,
    pub datasource: DataSource,
}

impl Layer {
    pub fn is_visible_at(&self, scale_denominator: f64) -> bool {
        scale_denominator >= self.min_scale_denominator
            && scale_denominator <= self.max_scale_denominator
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapStyle {
    pub srs: Option<String>,
    pub buffer_size: u32,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub strict: bool,
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct LayerDraft {
    name: String,
    active: bool,
    min_scale_denominator: f64,
    max_scale_denominator: f64,
    datasource: Option<DatasourceDraft>,
}

#[derive(Debug, Default)]
struct DatasourceDraft {
    name: Option<String>,
    base: Option<String>,
    parameters: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct ParameterDraft {
    name: String,
    value: String,
}

struct StyleBuilder<'a> {
    options: &'a ParseOptions,
    srs: Option<String>,
    buffer_size: u32,
    layers: Vec<LayerDraft>,
    templates: HashMap<String, BTreeMap<String, String>>,
    layer: Option<LayerDraft>,
    datasource: Option<DatasourceDraft>,
    parameter: Option<ParameterDraft>,
}

impl<'a> StyleBuilder<'a> {
    fn new(options: &'a ParseOptions) -> Self {
        Self {
            options,
            srs: None,
            buffer_size: 0,
            layers: Vec::new(),
            templates: HashMap::new(),
            layer: None,
            datasource: None,
            parameter: None,
        }
    }

    fn recover<T>(&self, fallback: T, message: String) -> Result<T, StyleError> {
        if self.options.strict {
            return Err(StyleError::Invalid(message));
        }
        tracing::warn!("{message}");
        Ok(fallback)
    }

    fn open(&mut self, element: &[u8], mut attrs: HashMap<String, String>) -> Result<(), StyleError> {
        match element {
            b"Map" => {
                self.srs = attrs.remove("srs");
                if let Some(value) = attrs.get("buffer-size") {
                    self.buffer_size = match value.trim().parse() {
                        Ok(size) => size,
                        Err(_) => self.recover(0, format!("invalid map buffer-size {value}"))?,
                    };
                }
            }
            b"Layer" => {
                let name = attrs.remove("name").unwrap_or_default();
                if name.is_empty() {
                    self.recover((), "layer without a name".to_string())?;
                }
                let active = match attrs.get("status").map(|s| s.trim().to_ascii_lowercase()) {
                    None => true,
                    Some(status) => match status.as_str() {
                        "on" | "true" | "1" | "yes" => true,
                        "off" | "false" | "0" | "no" => false,
                        _ => self.recover(true, format!("layer {name}: invalid status {status}"))?,
                    },
                };
                let min_scale_denominator = self.scale_attr(
                    &name,
                    &attrs,
                    &["minimum-scale-denominator", "minzoom"],
                    0.0,
                )?;
                let max_scale_denominator = self.scale_attr(
                    &name,
                    &attrs,
                    &["maximum-scale-denominator", "maxzoom"],
                    f64::INFINITY,
                )?;
                self.layer = Some(LayerDraft {
                    name,
                    active,
                    min_scale_denominator,
                    max_scale_denominator,
                    datasource: None,
                });
            }
            b"Datasource" => {
                self.datasource = Some(DatasourceDraft {
                    name: attrs.remove("name"),
                    base: attrs.remove("base"),
                    parameters: BTreeMap::new(),
                });
            }
            b"Parameter" if self.datasource.is_some() => {
                self.parameter = Some(ParameterDraft {
                    name: attrs.remove("name").unwrap_or_default(),
                    value: String::new(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn scale_attr(
        &self,
        layer: &str,
        attrs: &HashMap<String, String>,
        keys: &[&str],
        default: f64,
    ) -> Result<f64, StyleError> {
        let Some((key, value)) = keys
            .iter()
            .find_map(|key| attrs.get(*key).map(|value| (*key, value)))
        else {
            return Ok(default);
        };
        match value.trim().parse::<f64>() {
            Ok(parsed) if !parsed.is_nan() => Ok(parsed),
            _ => self.recover(default, format!("layer {layer}: invalid {key} {value}")),
        }
    }

    fn text(&mut self, content: &str) {
        if let Some(parameter) = self.parameter.as_mut() {
            parameter.value.push_str(content);
        }
    }

    fn close(&mut self, element: &[u8]) -> Result<(), StyleError> {
        match element {
            b"Parameter" => {
                if let (Some(parameter), Some(datasource)) =
                    (self.parameter.take(), self.datasource.as_mut())
                {
                    datasource
                        .parameters
                        .insert(parameter.name, parameter.value);
                }
            }
            b"Datasource" => {
                let Some(datasource) = self.datasource.take() else {
                    return Ok(());
                };
                if let Some(layer) = self.layer.as_mut() {
                    layer.datasource = Some(datasource);
                    return Ok(());
                }
                match datasource.name {
                    Some(name) => {
                        self.templates.insert(name, datasource.parameters);
                    }
                    None => self.recover((), "top-level datasource without a name".to_string())?,
                }
            }
            b"Layer" => {
                if let Some(layer) = self.layer.take() {
                    self.layers.push(layer);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<MapStyle, StyleError> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for draft in self.layers.iter() {
            let datasource = match draft.datasource.as_ref() {
                Some(datasource) => {
                    let parameters = self.resolve_parameters(&draft.name, datasource)?;
                    DataSource::from_parameters(&draft.name, parameters)?
                }
                None => self.recover(
                    DataSource::Unsupported {
                        type_name: None,
                        parameters: BTreeMap::new(),
                    },
                    format!("layer {} has no datasource", draft.name),
                )?,
            };
            layers.push(Layer {
                name: draft.name.clone(),
                active: draft.active,
                min_scale_denominator: draft.min_scale_denominator,
                max_scale_denominator: draft.max_scale_denominator,
                datasource,
            });
        }
        Ok(MapStyle {
            srs: self.srs,
            buffer_size: self.buffer_size,
            layers,
        })
    }

    fn resolve_parameters(
        &self,
        layer: &str,
        datasource: &DatasourceDraft,
    ) -> Result<BTreeMap<String, String>, StyleError> {
        let mut parameters = match datasource.base.as_deref() {
            Some(base) => match self.templates.get(base) {
                Some(template) => template.clone(),
                None => self.recover(
                    BTreeMap::new(),
                    format!("layer {layer}: unknown datasource base {base}"),
                )?,
            },
            None => BTreeMap::new(),
        };
        parameters.extend(
            datasource
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        if let (Some(file), Some(base_dir)) = (parameters.get_mut("file"), self.options.base_dir.as_ref())
        {
            let path = Path::new(file.as_str());
            if path.is_relative() {
                *file = base_dir.join(path).to_string_lossy().into_owned();
            }
        }
        Ok(parameters)
    }
}

static ENTITY_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!ENTITY\s+([^\s%"']+)\s+(?:"([^"]*)"|'([^']*)')\s*>"#)
        .expect("valid entity pattern")
});

/// Internal entities declared in the document type, plus the predefined XML ones.
/// External (`SYSTEM`/`PUBLIC`) and parameter entities are not loaded.
struct Entities(HashMap<String, String>);

impl Entities {
    fn new() -> Self {
        let predefined = [
            ("lt", "<"),
            ("gt", ">"),
            ("amp", "&"),
            ("apos", "'"),
            ("quot", "\""),
        ];
        Self(
            predefined
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }

    fn declare(&mut self, doctype: &str) {
        for caps in ENTITY_DECL.captures_iter(doctype) {
            let name = caps[1].to_string();
            let raw = caps.get(2).or(caps.get(3)).map_or("", |m| m.as_str());
            let value = match unescape(raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.to_string(),
            };
            // first declaration wins
            self.0.entry(name).or_insert(value);
        }
    }

    fn resolve(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

fn attributes(
    element: &BytesStart,
    entities: &Entities,
) -> Result<HashMap<String, String>, StyleError> {
    let mut attrs = HashMap::new();
    for attr in element.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(|name| entities.resolve(name))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Parses a Mapnik XML style document into its layers and datasources.
pub fn parse_style(text: &str, options: &ParseOptions) -> Result<MapStyle, StyleError> {
    let mut reader = XmlReader::from_str(text);
    reader.trim_text(true);

    let mut builder = StyleBuilder::new(options);
    let mut entities = Entities::new();
    let mut saw_map = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                saw_map |= e.name().as_ref() == b"Map";
                let attrs = attributes(&e, &entities)?;
                builder.open(e.name().as_ref(), attrs)?;
            }
            Event::Empty(e) => {
                saw_map |= e.name().as_ref() == b"Map";
                let attrs = attributes(&e, &entities)?;
                builder.open(e.name().as_ref(), attrs)?;
                builder.close(e.name().as_ref())?;
            }
            Event::End(e) => builder.close(e.name().as_ref())?,
            Event::DocType(e) => {
                entities.declare(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::Text(e) => {
                let content = e.unescape_with(|name| entities.resolve(name))?;
                builder.text(&content);
            }
            Event::CData(e) => {
                let content = e.into_inner();
                builder.text(&String::from_utf8_lossy(&content));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_map {
        return Err(StyleError::Invalid(
            "style document has no Map element".to_string(),
        ));
    }
    builder.finish()
}

/// Reads a style file in strict mode, resolving relative paths against its directory.
pub fn read_style(path: &Path) -> Result<MapStyle, ProfileError> {
    let load = || -> Result<MapStyle, StyleError> {
        let contents = fs::read_to_string(path).map_err(|source| StyleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let options = ParseOptions {
            strict: true,
            base_dir: path.parent().map(Path::to_path_buf),
        };
        parse_style(&contents, &options)
    };
    load().map_err(|source| ProfileError::StyleLoad {
        path: path.to_path_buf(),
        source,
    })
}

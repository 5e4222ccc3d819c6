use std::fs;
use std::path::Path;

use layer_profiler::error::{ProfileError, StyleError};
use layer_profiler::style::{DataSource, ParseOptions, SourceKind, parse_style, read_style};

const STYLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Map srs="+init=epsg:3857" buffer-size="128">
  <Datasource name="osm">
    <Parameter name="type">postgis</Parameter>
    <Parameter name="host">db.internal</Parameter>
    <Parameter name="port">5433</Parameter>
    <Parameter name="dbname">gis</Parameter>
    <Parameter name="geometry_field">way</Parameter>
  </Datasource>
  <Style name="roads"><Rule><LineSymbolizer/></Rule></Style>
  <Layer name="roads" minimum-scale-denominator="1000" maximum-scale-denominator="500000">
    <StyleName>roads</StyleName>
    <Datasource base="osm">
      <Parameter name="table"><![CDATA[(SELECT way, highway FROM planet_osm_line WHERE way && !bbox! AND highway <> '') AS data]]></Parameter>
      <Parameter name="simplify_geometries">true</Parameter>
    </Datasource>
  </Layer>
  <Layer name="hidden" status="off">
    <Datasource base="osm">
      <Parameter name="table">planet_osm_polygon</Parameter>
    </Datasource>
  </Layer>
  <Layer name="hillshade" srs="+init=epsg:3857">
    <Datasource>
      <Parameter name="type">pgraster</Parameter>
      <Parameter name="table">dem</Parameter>
      <Parameter name="raster_field">rast</Parameter>
    </Datasource>
  </Layer>
  <Layer name="coastline">
    <Datasource>
      <Parameter name="type">shape</Parameter>
      <Parameter name="file">data/coast.shp</Parameter>
    </Datasource>
  </Layer>
</Map>
"#;

fn strict() -> ParseOptions {
    ParseOptions {
        strict: true,
        base_dir: None,
    }
}

#[test]
fn parse_style_reads_map_and_layers_in_order() {
    let style = parse_style(STYLE, &strict()).expect("style");
    assert_eq!(style.buffer_size, 128);
    assert_eq!(style.srs.as_deref(), Some("+init=epsg:3857"));
    let names: Vec<&str> = style.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["roads", "hidden", "hillshade", "coastline"]);
}

#[test]
fn parse_style_merges_datasource_templates() {
    let style = parse_style(STYLE, &strict()).expect("style");
    let roads = &style.layers[0];
    assert!(roads.active);
    assert_eq!(roads.min_scale_denominator, 1000.0);
    assert_eq!(roads.max_scale_denominator, 500000.0);
    assert_eq!(roads.datasource.kind(), Some(SourceKind::Postgis));

    let source = roads.datasource.spatial_table().expect("spatial");
    assert!(source.table.starts_with("(SELECT way, highway FROM planet_osm_line"));
    assert!(source.table.contains("highway <> ''"));
    assert_eq!(source.geometry_field.as_deref(), Some("way"));
    assert!(source.simplify_geometries);
    assert_eq!(source.credentials.host.as_deref(), Some("db.internal"));
    assert_eq!(source.credentials.port, Some(5433));
    assert_eq!(source.credentials.dbname.as_deref(), Some("gis"));
    assert_eq!(source.credentials.user, None);
}

#[test]
fn parse_style_applies_layer_defaults() {
    let style = parse_style(STYLE, &strict()).expect("style");
    let hidden = &style.layers[1];
    assert!(!hidden.active);
    assert_eq!(hidden.min_scale_denominator, 0.0);
    assert_eq!(hidden.max_scale_denominator, f64::INFINITY);
    let source = hidden.datasource.spatial_table().expect("spatial");
    assert!(!source.simplify_geometries);

    let hillshade = &style.layers[2];
    assert_eq!(hillshade.datasource.kind(), Some(SourceKind::Pgraster));
    let source = hillshade.datasource.spatial_table().expect("spatial");
    assert_eq!(source.spatial_column(), Some("rast"));
}

#[test]
fn parse_style_keeps_unsupported_datasources() {
    let options = ParseOptions {
        strict: true,
        base_dir: Some(Path::new("/styles").to_path_buf()),
    };
    let style = parse_style(STYLE, &options).expect("style");
    match &style.layers[3].datasource {
        DataSource::Unsupported {
            type_name,
            parameters,
        } => {
            assert_eq!(type_name.as_deref(), Some("shape"));
            assert_eq!(
                parameters.get("file").map(String::as_str),
                Some("/styles/data/coast.shp")
            );
        }
        other => panic!("expected unsupported datasource, got {other:?}"),
    }
}

#[test]
fn simplify_flag_requires_literal_true() {
    let xml = r#"<Map><Layer name="a"><Datasource>
        <Parameter name="type">postgis</Parameter>
        <Parameter name="table">roads</Parameter>
        <Parameter name="geometry_field">way</Parameter>
        <Parameter name="simplify_geometries">yes</Parameter>
    </Datasource></Layer></Map>"#;
    let style = parse_style(xml, &strict()).expect("style");
    let source = style.layers[0].datasource.spatial_table().expect("spatial");
    assert!(!source.simplify_geometries);
}

#[test]
fn supported_datasource_requires_table() {
    let xml = r#"<Map><Layer name="a"><Datasource>
        <Parameter name="type">postgis</Parameter>
    </Datasource></Layer></Map>"#;
    let err = parse_style(xml, &strict()).expect_err("missing table");
    assert!(matches!(err, StyleError::Invalid(message) if message.contains("table")));
}

#[test]
fn strict_mode_rejects_unknown_base_and_status() {
    let unknown_base = r#"<Map><Layer name="a"><Datasource base="nope">
        <Parameter name="type">postgis</Parameter>
        <Parameter name="table">roads</Parameter>
    </Datasource></Layer></Map>"#;
    assert!(parse_style(unknown_base, &strict()).is_err());

    let bad_status = r#"<Map><Layer name="a" status="maybe"/></Map>"#;
    assert!(parse_style(bad_status, &strict()).is_err());

    let lenient = ParseOptions::default();
    let style = parse_style(bad_status, &lenient).expect("lenient");
    assert!(style.layers[0].active);
    assert_eq!(style.layers[0].datasource.kind(), None);
}

#[test]
fn parse_style_rejects_documents_without_map() {
    assert!(parse_style("<Other/>", &strict()).is_err());
    assert!(parse_style("<Map><Layer name=\"a\"></Map>", &strict()).is_err());
}

#[test]
fn read_style_reports_missing_files_as_style_load_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing.xml");
    let err = read_style(&path).expect_err("missing");
    assert!(matches!(
        err,
        ProfileError::StyleLoad {
            source: StyleError::Io { .. },
            ..
        }
    ));
}

#[test]
fn read_style_resolves_files_against_style_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("style.xml");
    fs::write(&path, STYLE).expect("write style");

    let style = read_style(&path).expect("style");
    match &style.layers[3].datasource {
        DataSource::Unsupported { parameters, .. } => {
            let expected = dir.path().join("data/coast.shp");
            assert_eq!(
                parameters.get("file").map(String::as_str),
                Some(expected.to_string_lossy().as_ref())
            );
        }
        other => panic!("expected unsupported datasource, got {other:?}"),
    }
}

#[test]
fn parse_style_resolves_internal_entities() {
    let text = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE Map [
<!ENTITY % settings SYSTEM "settings.ent">
<!ENTITY dbname "gis">
<!ENTITY host 'db.internal'>
<!ENTITY buffer "64">
<!ENTITY srs "+proj=merc +a=6378137 +b=6378137 +units=m &amp; +no_defs">
]>
<Map srs="&srs;" buffer-size="&buffer;">
  <Layer name="roads">
    <Datasource>
      <Parameter name="type">postgis</Parameter>
      <Parameter name="host">&host;</Parameter>
      <Parameter name="dbname">&dbname;</Parameter>
      <Parameter name="table">(SELECT way FROM planet_osm_line WHERE highway &lt;&gt; '') AS data</Parameter>
      <Parameter name="geometry_field">way</Parameter>
    </Datasource>
  </Layer>
</Map>
"#;
    let style = parse_style(text, &strict()).expect("style");
    assert_eq!(style.buffer_size, 64);
    assert_eq!(
        style.srs.as_deref(),
        Some("+proj=merc +a=6378137 +b=6378137 +units=m & +no_defs")
    );
    match &style.layers[0].datasource {
        DataSource::Postgis(source) => {
            assert_eq!(source.credentials.host.as_deref(), Some("db.internal"));
            assert_eq!(source.credentials.dbname.as_deref(), Some("gis"));
            assert_eq!(
                source.table,
                "(SELECT way FROM planet_osm_line WHERE highway <> '') AS data"
            );
        }
        other => panic!("expected postgis datasource, got {other:?}"),
    }
}

#[test]
fn parse_style_rejects_undeclared_entities() {
    let text = r#"<Map><Layer name="roads"><Datasource>
      <Parameter name="dbname">&dbname;</Parameter>
    </Datasource></Layer></Map>"#;
    assert!(matches!(
        parse_style(text, &strict()),
        Err(StyleError::Xml(_))
    ));
}

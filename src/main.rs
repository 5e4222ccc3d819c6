use anyhow::Result;
use clap::Parser;

use layer_profiler::cli::{Cli, Command, ProfileArgs, QueryArgs, ReportFormat};
use layer_profiler::map::MapContext;
use layer_profiler::mercator::{parse_tile_spec, tile_to_bbox};
use layer_profiler::output::{format_query_lines, format_report_lines, report_json_string};
use layer_profiler::profile::{ProfileOptions, prepare_query};
use layer_profiler::run::{DEFAULT_TILES, RunOptions, run_path};
use layer_profiler::store::PgStore;
use layer_profiler::style::read_style;
use layer_profiler::tile::TileOptions;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match cli.command {
        Command::Profile(args) => profile(args).await?,
        Command::Query(args) => query(args)?,
    }

    Ok(())
}

async fn profile(args: ProfileArgs) -> Result<()> {
    if args.top == 0 {
        anyhow::bail!("--top must be greater than zero");
    }
    let tiles = if args.tiles.is_empty() {
        DEFAULT_TILES.to_vec()
    } else {
        args.tiles
            .iter()
            .map(|value| parse_tile_spec(value))
            .collect::<Result<Vec<_>>>()?
    };
    let options = RunOptions {
        tile: TileOptions {
            profile: ProfileOptions {
                count_vertices: args.count_vertices,
                layers: args.layers.clone(),
            },
            tms: args.tms,
            no_progress: args.no_progress,
        },
        ..RunOptions::default()
    };
    let store = PgStore::new(args.max_connections);

    run_path(&args.style, &tiles, &store, &options, |report| {
        match args.output {
            ReportFormat::Text => {
                for line in format_report_lines(report, args.top, args.count_vertices) {
                    println!("{}", line);
                }
            }
            ReportFormat::Json => {
                println!("{}", report_json_string(report, args.top)?);
            }
        }
        Ok(())
    })
    .await?;

    Ok(())
}

fn query(args: QueryArgs) -> Result<()> {
    let tile = parse_tile_spec(&args.tile)?;
    let style = read_style(&args.style)?;
    let mut map = MapContext::default().with_buffer_size(style.buffer_size);
    map.zoom_to_box(tile_to_bbox(tile, args.tms));

    let options = ProfileOptions {
        count_vertices: false,
        layers: args.layers,
    };
    for layer in style.layers.iter() {
        if let Some(prepared) = prepare_query(&map, layer, &options)? {
            for line in format_query_lines(&prepared) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

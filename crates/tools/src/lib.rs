//! Command-line front end: renders a choropleth to SVG from files on disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use datamap::{Datamap, MapError, MapOptions, render_document};
use formats::dataset::DataType;
use formats::region::RegionFilter;
use formats::topology::Topology;
use serde::Serialize;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(author, version, about = "Render TopoJSON choropleth maps to SVG")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Draw a map and write it as an SVG document
    Render(RenderArgs),
    /// List the collections of a topology, or the regions of one scope
    Regions {
        #[arg(long)]
        topology: PathBuf,

        /// Collection to list; omit to list collection names
        #[arg(long)]
        scope: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// TopoJSON file with the scope's collection
    #[arg(long)]
    pub topology: PathBuf,

    #[arg(long, default_value = "world")]
    pub scope: String,

    /// Choropleth data, JSON object or CSV with an `id` column
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Map options as JSON (camelCase keys)
    #[arg(long)]
    pub options: Option<PathBuf>,

    #[arg(long)]
    pub projection: Option<String>,

    #[arg(long)]
    pub width: Option<f64>,

    #[arg(long)]
    pub height: Option<f64>,

    /// Draw a graticule below the regions
    #[arg(long, default_value_t = false)]
    pub graticule: bool,

    /// Label regions that have a known label position
    #[arg(long, default_value_t = false)]
    pub labels: bool,

    /// Bubble array as JSON
    #[arg(long)]
    pub bubbles: Option<PathBuf>,

    /// Arc array as JSON
    #[arg(long)]
    pub arcs: Option<PathBuf>,

    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug)]
pub enum ToolError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, reason: String },
    Map(MapError),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            ToolError::Json { path, reason } => write!(f, "{}: {reason}", path.display()),
            ToolError::Map(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::Io { source, .. } => Some(source),
            ToolError::Map(e) => Some(e),
            ToolError::Json { .. } => None,
        }
    }
}

impl From<MapError> for ToolError {
    fn from(e: MapError) -> Self {
        ToolError::Map(e)
    }
}

fn read(path: &Path) -> Result<String, ToolError> {
    fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json(path: &Path) -> Result<Value, ToolError> {
    serde_json::from_str(&read(path)?).map_err(|e| ToolError::Json {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_topology(path: &Path) -> Result<Topology, ToolError> {
    Topology::from_json_str(&read(path)?).map_err(|e| ToolError::Map(e.into()))
}

fn data_type_for(path: &Path) -> DataType {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => DataType::Csv,
        _ => DataType::Json,
    }
}

/// What a render wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSummary {
    pub out: PathBuf,
    pub regions: usize,
    pub layers: usize,
    pub bytes: usize,
    pub counters: Vec<(String, u64)>,
}

/// Builds the map described by `args`, settles its transitions and writes
/// the SVG document.
pub fn render(args: &RenderArgs) -> Result<RenderSummary, ToolError> {
    let mut options = match &args.options {
        Some(path) => MapOptions::from_json_value(read_json(path)?).map_err(|e| ToolError::Json {
            path: path.clone(),
            reason: e.to_string(),
        })?,
        None => MapOptions::default(),
    };
    options.scope = args.scope.clone();
    if let Some(projection) = &args.projection {
        options.projection = projection.clone();
    }
    if args.width.is_some() {
        options.width = args.width;
    }
    if args.height.is_some() {
        options.height = args.height;
    }

    let topology = read_topology(&args.topology)?;
    let mut map = Datamap::new(options, topology)?;
    if args.graticule {
        map.graticule()?;
    }
    map.draw()?;

    if let Some(path) = &args.data {
        map.load_data_payload(&read(path)?, data_type_for(path))?;
    }
    if let Some(path) = &args.bubbles {
        map.bubbles(read_json(path)?, None)?;
    }
    if let Some(path) = &args.arcs {
        map.arc(read_json(path)?, None)?;
    }
    if args.labels {
        map.labels(None)?;
    }
    map.settle();

    let svg = render_document(&map);
    fs::write(&args.out, &svg).map_err(|source| ToolError::Io {
        path: args.out.clone(),
        source,
    })?;
    tracing::info!(out = %args.out.display(), bytes = svg.len(), "svg written");

    Ok(RenderSummary {
        out: args.out.clone(),
        regions: map.regions().len(),
        layers: map.layers().len(),
        bytes: svg.len(),
        counters: map.metrics().counters(),
    })
}

/// Collection names, or `id<TAB>name` lines for one collection.
pub fn list_regions(topology: &Path, scope: Option<&str>) -> Result<Vec<String>, ToolError> {
    let topology = read_topology(topology)?;
    let Some(scope) = scope else {
        return Ok(topology.collections().into_iter().map(str::to_string).collect());
    };
    let regions = topology
        .regions(scope, &RegionFilter::none())
        .map_err(|e| ToolError::Map(e.into()))?;
    Ok(regions
        .iter()
        .map(|r| format!("{}\t{}", r.id, r.name()))
        .collect())
}

pub fn run(cli: Cli) -> Result<(), ToolError> {
    match cli.command {
        Command::Render(args) => {
            let summary = render(&args)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).map_err(|e| ToolError::Json {
                    path: summary.out.clone(),
                    reason: e.to_string(),
                })?
            );
        }
        Command::Regions { topology, scope } => {
            for line in list_regions(&topology, scope.as_deref())? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, RenderArgs, ToolError, list_regions, render};
    use clap::Parser;
    use datamap::MapError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::{Path, PathBuf};

    const TOPOLOGY: &str = r#"{
        "type": "Topology",
        "objects": {
            "world": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "id": "AAA", "properties": {"name": "Alpha"}, "arcs": [[0]]},
                    {"type": "Polygon", "id": "BBB", "properties": {"name": "Beta"}, "arcs": [[1]]}
                ]
            }
        },
        "arcs": [
            [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
            [[20, 0], [30, 0], [30, 10], [20, 10], [20, 0]]
        ]
    }"#;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn args(dir: &Path) -> RenderArgs {
        RenderArgs {
            topology: write(dir, "world.topo.json", TOPOLOGY),
            scope: "world".into(),
            data: None,
            options: None,
            projection: None,
            width: None,
            height: None,
            graticule: false,
            labels: false,
            bubbles: None,
            arcs: None,
            out: dir.join("map.svg"),
        }
    }

    #[test]
    fn parses_render_flags() {
        let cli = Cli::try_parse_from([
            "datamaps",
            "render",
            "--topology",
            "t.json",
            "--projection",
            "mercator",
            "--graticule",
            "--width",
            "800",
            "--out",
            "o.svg",
        ])
        .unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.scope, "world");
        assert_eq!(args.projection.as_deref(), Some("mercator"));
        assert!(args.graticule);
        assert_eq!(args.width, Some(800.0));
    }

    #[test]
    fn renders_csv_data_and_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.options = Some(write(
            dir.path(),
            "options.json",
            r##"{"fills": {"defaultFill": "#cccccc", "HIGH": "#ff0000"}}"##,
        ));
        args.data = Some(write(dir.path(), "data.csv", "id,fillKey\nAAA,HIGH\n"));
        args.bubbles = Some(write(
            dir.path(),
            "bubbles.json",
            r#"[{"name": "b", "radius": 6, "centered": "BBB"}]"#,
        ));
        args.graticule = true;

        let summary = render(&args).unwrap();
        assert_eq!(summary.regions, 2);
        assert_eq!(summary.layers, 3);

        let svg = fs::read_to_string(&args.out).unwrap();
        assert_eq!(summary.bytes, svg.len());
        assert!(svg.contains("<g class=\"graticule\">"));
        assert!(svg.contains("fill=\"#ff0000\""));
        assert!(svg.contains("fill=\"#cccccc\""));
        assert!(svg.contains("<circle class=\"datamaps-bubble\""));
    }

    #[test]
    fn missing_scope_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.scope = "usa".into();
        let err = render(&args).unwrap_err();
        assert!(matches!(err, ToolError::Map(MapError::Topology(_))));
        assert!(!args.out.exists());
    }

    #[test]
    fn lists_collections_and_regions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.json", TOPOLOGY);
        assert_eq!(list_regions(&path, None).unwrap(), vec!["world"]);
        assert_eq!(
            list_regions(&path, Some("world")).unwrap(),
            vec!["AAA\tAlpha", "BBB\tBeta"]
        );
        let missing = list_regions(&dir.path().join("nope.json"), None).unwrap_err();
        assert!(matches!(missing, ToolError::Io { .. }));
    }
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use chrono::NaiveDate;
use sarscene::{AggregationStrategy, RenderVariant, Season};

#[derive(Parser)]
#[command(name = "sarscene", version, about = "Adaptive scene query and SAR classification CLI")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// JSON config file (service endpoints and resolver settings)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (otherwise RUST_LOG applies)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bounding box, area and render dimensions for an area (no network)
    Size {
        #[command(flatten)]
        area: AreaArgs,

        /// Target ground resolution in meters per pixel
        #[arg(long)]
        resolution: Option<f64>,
    },

    /// Acquisition mode encoded in a scene identifier
    Mode {
        scene_id: String,
    },

    /// Print the per-pixel script generated for a variant
    Script {
        #[arg(long, value_enum, default_value_t = RenderVariant::RadarLandCover)]
        variant: RenderVariant,

        #[arg(long, value_enum)]
        season: Option<Season>,

        /// Scene identifier to take polarization from
        #[arg(long)]
        scene_id: Option<String>,
    },

    /// Acquisition dates available over an area
    Dates {
        #[command(flatten)]
        area: AreaArgs,

        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,

        #[arg(long, value_enum, default_value_t = RenderVariant::TrueColor)]
        variant: RenderVariant,
    },

    /// Resolve a date and write the rendered image
    Render {
        #[command(flatten)]
        scene: SceneArgs,

        #[arg(long, value_enum, default_value_t = RenderVariant::TrueColor)]
        variant: RenderVariant,

        /// Output file; the extension follows the returned content type when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve a date and print radar backscatter statistics as JSON
    Stats {
        #[command(flatten)]
        scene: SceneArgs,

        /// Second date to compare against, fetched concurrently
        #[arg(long)]
        compare: Option<NaiveDate>,

        #[arg(long, value_enum)]
        aggregation: Option<AggregationStrategy>,
    },

    /// Resolve a date and classify the radar raster locally
    Classify {
        #[command(flatten)]
        scene: SceneArgs,

        /// Produce a binary water mask instead of land cover
        #[arg(long, default_value_t = false)]
        water_mask: bool,

        /// Write the encoded class raster (one byte per pixel, class x 50) here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Clone)]
pub struct AreaArgs {
    /// Bounding box as min_lon,min_lat,max_lon,max_lat
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, conflicts_with = "polygon")]
    pub bbox: Option<Vec<f64>>,

    /// JSON file holding a polygon ring or a GeoJSON Polygon
    #[arg(long)]
    pub polygon: Option<PathBuf>,
}

#[derive(Args, Clone)]
pub struct SceneArgs {
    #[command(flatten)]
    pub area: AreaArgs,

    /// Target acquisition date (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,

    /// Override the season derived from date and hemisphere
    #[arg(long, value_enum)]
    pub season: Option<Season>,

    #[arg(long)]
    pub resolution: Option<f64>,

    /// Scene identifier to take the acquisition mode from
    #[arg(long)]
    pub scene_id: Option<String>,
}

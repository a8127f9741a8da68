use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sarscene::api::{self, SceneRequest, SceneResponse, SceneService};
use sarscene::core::geometry::{BoundingBox, Polygon};
use sarscene::core::params::Config;
use sarscene::core::render::describe;
use sarscene::core::mode;
use sarscene::io::{HubClient, OAuthTokenProvider};
use sarscene::{OutputFormat, RenderVariant};

use super::args::{AreaArgs, CliArgs, Command, SceneArgs};
use super::errors::AppError;

type Service = SceneService<Arc<HubClient<OAuthTokenProvider>>, Arc<HubClient<OAuthTokenProvider>>>;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config, AppError> {
    match path {
        Some(p) => {
            info!("Loading config from {:?}", p);
            Ok(Config::load(p)?)
        }
        None => Ok(Config::default()),
    }
}

fn connect(config: &Config) -> Result<Service, AppError> {
    let service = config.service.clone().with_env_credentials()?;
    let tokens = OAuthTokenProvider::new(&service)?;
    let client = Arc::new(HubClient::new(&service, tokens)?);
    Ok(SceneService::new(client.clone(), client, config.resolver.clone()))
}

/// Accepts `[[lon, lat], ...]`, `[[[lon, lat], ...]]` or a GeoJSON Polygon / Feature.
fn read_polygon(path: &Path) -> Result<Polygon, AppError> {
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let geometry = value.get("geometry").unwrap_or(&value);
    let coords = geometry.get("coordinates").unwrap_or(geometry);

    let ring = match coords.pointer("/0/0/0") {
        // nested rings: take the outer one
        Some(_) => coords.get(0).cloned(),
        None => Some(coords.clone()),
    };
    ring.and_then(|r| serde_json::from_value::<Vec<Vec<f64>>>(r).ok())
        .map(Polygon::new)
        .ok_or_else(|| AppError::BadPolygonFile {
            path: path.to_path_buf(),
        })
}

fn area_request(area: &AreaArgs, request: &mut SceneRequest) -> Result<(), AppError> {
    match (&area.bbox, &area.polygon) {
        (Some(values), _) => {
            let &[a, b, c, d] = values.as_slice() else {
                return Err(AppError::BadBbox { count: values.len() });
            };
            request.bbox = Some(BoundingBox::new(a, b, c, d)?);
        }
        (None, Some(path)) => request.polygon = Some(read_polygon(path)?),
        (None, None) => {
            return Err(AppError::MissingArgument {
                arg: "--bbox or --polygon".to_string(),
            });
        }
    }
    Ok(())
}

fn scene_request(args: &SceneArgs, variant: RenderVariant) -> Result<SceneRequest, AppError> {
    let mut request = SceneRequest::new(None, None, args.date, variant);
    request.season = args.season;
    request.resolution_m = args.resolution;
    request.scene_id = args.scene_id.clone();
    area_request(&args.area, &mut request)?;
    Ok(request)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn extension_for(content_type: &str) -> &'static str {
    [OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Tiff]
        .iter()
        .find(|f| content_type.starts_with(f.mime_type()))
        .map(|f| f.extension())
        .unwrap_or("bin")
}

fn report_no_coverage<T>(response: &SceneResponse<T>) {
    if let SceneResponse::NoCoverage(none) = response {
        warn!(
            "No coverage; attempted {} date(s), {} suggestion(s)",
            none.attempted_dates.len(),
            none.suggested_dates.len()
        );
    }
}

pub async fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Size { area, resolution } => {
            let mut request = SceneRequest::new(
                None,
                None,
                chrono::Utc::now().date_naive(),
                RenderVariant::TrueColor,
            );
            request.resolution_m = resolution;
            area_request(&area, &mut request)?;
            print_json(&api::plan(&request, &config.resolver)?)?;
        }

        Command::Mode { scene_id } => {
            print_json(&mode::classify(&scene_id))?;
        }

        Command::Script {
            variant,
            season,
            scene_id,
        } => {
            let acquisition = scene_id
                .as_deref()
                .map(mode::classify)
                .unwrap_or(mode::DEFAULT_MODE);
            let descriptor = describe(variant, &acquisition, season)?;
            print!("{}", descriptor.evalscript);
        }

        Command::Dates {
            area,
            from,
            to,
            variant,
        } => {
            let mut request = SceneRequest::new(None, None, from, variant);
            area_request(&area, &mut request)?;
            let service = connect(&config)?;
            let dates = service.available_dates(&request, from, to).await?;
            print_json(&dates)?;
        }

        Command::Render {
            scene,
            variant,
            output,
        } => {
            let request = scene_request(&scene, variant)?;
            let service = connect(&config)?;
            let response = service.render(&request).await?;
            if let SceneResponse::Covered(rendered) = &response {
                let output = output.unwrap_or_else(|| {
                    PathBuf::from(format!(
                        "scene_{}.{}",
                        rendered.resolved_date,
                        extension_for(&rendered.payload.content_type)
                    ))
                });
                fs::write(&output, &rendered.payload.bytes)?;
                info!("Wrote {} bytes to {:?}", rendered.payload.size_bytes, output);
                for w in &rendered.warnings {
                    warn!("{}", w);
                }
            }
            report_no_coverage(&response);
            print_json(&response)?;
        }

        Command::Stats {
            scene,
            compare,
            aggregation,
        } => {
            let mut request = scene_request(&scene, RenderVariant::RadarStatistics)?;
            request.compare_date = compare;
            let mut config = config;
            if let Some(a) = aggregation {
                config.resolver.aggregation = a;
            }
            let service = connect(&config)?;
            if request.compare_date.is_some() {
                print_json(&service.compare(&request).await?)?;
            } else {
                let response = service.statistics(&request).await?;
                report_no_coverage(&response);
                print_json(&response)?;
            }
        }

        Command::Classify {
            scene,
            water_mask,
            output,
        } => {
            let variant = if water_mask {
                RenderVariant::RadarWaterMask
            } else {
                RenderVariant::RadarLandCover
            };
            let request = scene_request(&scene, variant)?;
            let service = connect(&config)?;
            let response = service.classify(&request).await?;
            if let (SceneResponse::Covered(classified), Some(path)) = (&response, output) {
                let bytes: Vec<u8> = classified.payload.classes.iter().copied().collect();
                fs::write(&path, &bytes)?;
                info!(
                    "Wrote {}x{} class raster to {:?}",
                    classified.width, classified.height, path
                );
            }
            report_no_coverage(&response);
            print_json(&response)?;
        }
    }

    Ok(())
}

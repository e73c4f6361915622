use std::env;

use lemsim_engine::{load_level, resolve_app_paths, LoopConfig, MetricsHandle, Scene};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use super::level_scene::LevelScene;

const LEVEL_ENV_VAR: &str = "LEMSIM_LEVEL";
const TPS_ENV_VAR: &str = "LEMSIM_TPS";
const DEFAULT_LEVEL: &str = "level1";
const MAX_TPS: u32 = 240;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) metrics: MetricsHandle,
}

/// Resolves paths, loads the selected level and builds its scene. Failures
/// are logged here; `None` means startup cannot continue.
pub(crate) fn build_app() -> Option<AppWiring> {
    init_tracing();
    info!("=== lemsim startup ===");

    let paths = resolve_app_paths()
        .inspect_err(|error| error!(error = %error, "startup_failed"))
        .ok()?;
    info!(
        root = %paths.root.display(),
        levels_dir = %paths.levels_dir.display(),
        cache_dir = %paths.cache_dir.display(),
        "startup"
    );

    let level_name = level_name_from_env();
    let level = load_level(&paths, Some(&level_name))
        .inspect_err(|error| error!(level = %level_name, error = %error, "level_load_failed"))
        .ok()?;
    let window_title = format!("lemsim - {}", level.label);

    let metrics = MetricsHandle::default();
    let scene = LevelScene::new(level, paths.cache_dir.clone(), metrics.clone())
        .inspect_err(|error| error!(level = %level_name, error = %error, "world_init_failed"))
        .ok()?;

    let defaults = LoopConfig::default();
    let target_tps = parse_tps(env::var(TPS_ENV_VAR).ok().as_deref(), defaults.target_tps);
    let config = LoopConfig {
        window_title,
        target_tps,
        ..defaults
    };

    Some(AppWiring {
        config,
        scene: Box::new(scene),
        metrics,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn level_name_from_env() -> String {
    env::var(LEVEL_ENV_VAR)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn parse_tps(raw: Option<&str>, fallback: u32) -> u32 {
    let Some(raw) = raw else {
        return fallback;
    };
    match raw.trim().parse::<u32>() {
        Ok(tps) if (1..=MAX_TPS).contains(&tps) => tps,
        _ => {
            warn!(
                env_var = TPS_ENV_VAR,
                value = raw,
                fallback,
                "invalid tick rate; falling back to default"
            );
            fallback
        }
    }
}

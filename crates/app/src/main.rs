//! Entry point for PickView.
//! Logging + command-line flags, then hands off to the platform loop.

use std::path::PathBuf;

use anyhow::Result;
use platform::ViewerConfig;

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_size_args(args: &[String], default: (u32, u32)) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    (w.unwrap_or(default.0).max(1), h.unwrap_or(default.1).max(1))
}

/// Last `--flag=PATH` wins.
fn parse_path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .filter_map(|arg| arg.strip_prefix(flag)?.strip_prefix('='))
        .filter(|v| !v.is_empty())
        .last()
        .map(PathBuf::from)
}

fn parse_config(args: &[String]) -> ViewerConfig {
    let defaults = ViewerConfig::default();
    let (width, height) = parse_size_args(args, (defaults.width, defaults.height));
    ViewerConfig {
        cube_path: parse_path_arg(args, "--cube").unwrap_or(defaults.cube_path),
        piggy_path: parse_path_arg(args, "--piggy").unwrap_or(defaults.piggy_path),
        piggy_texture: parse_path_arg(args, "--piggy-texture").or(defaults.piggy_texture),
        width,
        height,
        backends: parse_backend_arg(args),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_config(&args);
    log::info!(
        "Starting PickView. Backend: {:?}, window_size={}x{}, cube={}, piggy={}",
        config.backends,
        config.width,
        config.height,
        config.cube_path.display(),
        config.piggy_path.display()
    );

    platform::run(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

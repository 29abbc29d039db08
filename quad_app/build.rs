// build.rs
// Compiles the GLSL shaders to SPIR-V when the Vulkan SDK is available

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../shaders");

    // Allow skipping shader compilation with an env var
    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            println!("cargo:rerun-if-env-changed=VULKAN_SDK");
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {}, shader compilation skipped", glslc);
        return;
    }

    let shader_dir = PathBuf::from("../shaders");
    let sources = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at {:?}", shader_dir);
            return;
        }
    };

    for entry in sources.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension() else {
            continue;
        };
        if ext != "vert" && ext != "frag" {
            continue;
        }

        // quad.vert -> quad.vert.spv, next to the source
        let file_name = match path.file_name() {
            Some(name) => name.to_os_string(),
            None => continue,
        };
        let mut out_name = file_name.clone();
        out_name.push(".spv");
        let out_file = shader_dir.join(out_name);

        let needs_compile = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(src_time), Ok(dst_time)) => src_time > dst_time,
                _ => true,
            },
            _ => true,
        };
        if !needs_compile {
            eprintln!("info: Shader {:?} is up to date", file_name);
            continue;
        }

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?}", file_name);
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {:?} with exit code {}", path, s.code().unwrap_or(-1));
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {:?}: {}", path, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }
}

//! s64-export - Sausage64 character export tool
//!
//! Converts skinned glTF/GLB scenes to `.S64` and rebuilds rigs from `.S64`
//! files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use s64_common::S64_EXT;
use s64_export::settings::load_settings;
use s64_export::{
    export_scene, import_s64, read_s64_file, ExportError, ExportSettings, GltfScene,
    ImportSettings, RotationFormat, SettingsFile,
};

#[derive(Parser)]
#[command(name = "s64-export")]
#[command(about = "Sausage64 character export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a skinned glTF/GLB scene to .S64
    Export {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output .S64 file (default: input with .S64 extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Settings file with [export] and [import] tables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fan-triangulate polygons with more than 3 corners, quads included
        #[arg(long)]
        triangulate: bool,

        /// Only export selected objects
        #[arg(long)]
        selected_only: bool,

        /// Export hidden objects too
        #[arg(long)]
        all_objects: bool,

        /// Rescale key times to this frame rate
        #[arg(long)]
        target_fps: Option<f32>,

        /// Frame rate the scene is authored at (default: 30)
        #[arg(long)]
        source_fps: Option<f32>,

        /// Keyframe rotation format
        #[arg(long, value_enum)]
        rotation: Option<RotationFormat>,

        /// Abort when a vertex group has no matching bone
        #[arg(long)]
        strict_weights: bool,
    },

    /// Rebuild a rig from a .S64 file
    Import {
        /// Input .S64 file
        input: PathBuf,

        /// Settings file with [export] and [import] tables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Group everything into a collection named after the file
        #[arg(long)]
        group: bool,

        /// Make vertices relative to their mesh root
        #[arg(long)]
        fix_root: bool,

        /// Write the rebuilt rig as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Parse a .S64 file and print what it contains
    Inspect {
        /// Input .S64 file
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ExportError>() {
            Some(export) if export.is_input_error() => {
                tracing::warn!("Export cancelled: {}", export);
                ExitCode::from(2)
            }
            _ => {
                tracing::error!("{:?}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Export {
            input,
            output,
            config,
            triangulate,
            selected_only,
            all_objects,
            target_fps,
            source_fps,
            rotation,
            strict_weights,
        } => {
            let mut settings = load_config(config.as_deref())?.export;
            settings.triangulate |= triangulate;
            settings.selected_only |= selected_only;
            settings.strict_weight_groups |= strict_weights;
            if all_objects {
                settings.visible_only = false;
            }
            if let Some(fps) = source_fps {
                settings.source_fps = fps;
            }
            if target_fps.is_some() {
                settings.target_fps = target_fps;
            }
            if let Some(rotation) = rotation {
                settings.rotation = rotation;
            }

            let output = output.unwrap_or_else(|| input.with_extension(S64_EXT));
            tracing::info!("Exporting {:?} -> {:?}", input, output);
            export(&input, &output, &settings)?;
            tracing::info!("Export complete!");
        }

        Commands::Import {
            input,
            config,
            group,
            fix_root,
            json,
        } => {
            let mut settings: ImportSettings = load_config(config.as_deref())?.import;
            settings.group |= group;
            settings.fix_root |= fix_root;

            let rig = import_s64(&input, &settings)?;
            for bone in &rig.bones {
                tracing::info!("  Bone '{}' at {}", bone.name, bone.head);
            }
            if rig.skipped_keys > 0 {
                tracing::warn!(
                    "{} keyframes named bones without a mesh and were skipped",
                    rig.skipped_keys
                );
            }
            if let Some(json) = json {
                let text = serde_json::to_string_pretty(&rig).context("Failed to serialize rig")?;
                std::fs::write(&json, text)
                    .with_context(|| format!("Failed to write output: {:?}", json))?;
                tracing::info!("Wrote rig to {:?}", json);
            }
        }

        Commands::Inspect { input } => {
            let model = read_s64_file(&input)
                .with_context(|| format!("Failed to parse S64 file: {:?}", input))?;

            for mesh in &model.meshes {
                tracing::info!(
                    "Mesh '{}': root {}, {} vertices, {} faces, materials {:?}",
                    mesh.name,
                    mesh.root,
                    mesh.vertices.len(),
                    mesh.faces.len(),
                    mesh.materials
                );
            }
            for animation in &model.animations {
                let first = animation.frames.first().map_or(0.0, |f| f.time);
                let last = animation.frames.last().map_or(0.0, |f| f.time);
                tracing::info!(
                    "Animation '{}': {} keyframes, frames {}..{}",
                    animation.name,
                    animation.frames.len(),
                    first,
                    last
                );
            }

            let summary = model.summary();
            tracing::info!(
                "{:?}: {} meshes, {} vertices, {} faces, {} materials, {} animations",
                input,
                summary.meshes,
                summary.vertices,
                summary.faces,
                summary.materials,
                summary.animations
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SettingsFile> {
    match path {
        Some(path) => load_settings(path),
        None => Ok(SettingsFile::default()),
    }
}

fn export(input: &Path, output: &Path, settings: &ExportSettings) -> Result<()> {
    // Reject bad frame rates before touching the input
    settings.time_scale()?;

    let mut scene = GltfScene::load(input, settings.source_fps)?;
    let summary = export_scene(&mut scene, settings, output)?;
    tracing::info!(
        "Exported {} meshes ({} vertices, {} faces), {} animations ({} keyframes)",
        summary.meshes,
        summary.vertices,
        summary.faces,
        summary.animations,
        summary.keyframes
    );
    Ok(())
}

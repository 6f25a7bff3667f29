//! hyptools - command line front end
//!
//! Operates on scene files written by `save_scene_to_file`. Commands that
//! change the scene write it back to `--output`, or over the input file.
//!
//! # Usage
//!
//! ```bash
//! # Group selected meshes into rigidbody trees
//! hyptools --scene props.json rigidbodies --select Rock_LOD0,Rock_LOD1,Rock_COL
//!
//! # Read a container's metadata
//! hyptools hyp-info lamp.hyp
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hyptools::app::{App, Codecs, CommandOutcome, SceneCommand};
use hyptools::grouping::group_variants;
use hyptools::hyp;
use hyptools::properties::{ColliderFlag, MeshFlag};
use hyptools::rename::{AffixOperation, CaseConversion, NumberPosition, Numbering, RenameOptions};
use hyptools::rig::RigDirection;
use hyptools::scene::serialization::{load_scene_from_file, save_scene_to_file};
use hyptools::scene::{ObjectId, PhysicsType, SceneState};
use hyptools::ui::{load_config_from_file, ColliderType, ToolConfig};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "hyptools")]
#[command(author, version, about = "Rigidbody hierarchies and .hyp containers", long_about = None)]
struct Cli {
    /// Scene file to operate on
    #[arg(short, long, global = true)]
    scene: Option<PathBuf>,

    /// Where to write the modified scene (defaults to --scene)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Tool settings JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    mass: Option<f32>,

    #[arg(long, global = true)]
    physics_type: Option<PhysicsType>,

    #[arg(long, global = true)]
    collider_type: Option<ColliderType>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the rigidbody trees of the scene
    Inspect,

    /// Show how objects group by base name
    Group {
        /// Comma-separated names (defaults to all top-level meshes)
        #[arg(long)]
        select: Option<String>,
    },

    /// Build one rigidbody per name group
    Rigidbodies {
        #[arg(long)]
        select: String,
    },

    /// Build a rigidbody from the selection; the first name is active
    Rigidbody {
        #[arg(long)]
        select: Option<String>,
    },

    /// Add snap points to the rigidbody owning an object
    Snap {
        #[arg(long)]
        object: String,

        /// Comma-separated vertex indices of the object's mesh
        #[arg(long)]
        vertices: Option<String>,
    },

    /// Batch rename the selected objects
    Rename {
        #[arg(long)]
        select: String,

        #[arg(long, requires = "replace")]
        find: Option<String>,

        #[arg(long)]
        replace: Option<String>,

        #[arg(long)]
        prefix: Option<String>,

        /// Remove the prefix instead of adding it
        #[arg(long, requires = "prefix")]
        remove_prefix: bool,

        #[arg(long)]
        suffix: Option<String>,

        #[arg(long, requires = "suffix")]
        remove_suffix: bool,

        /// upper, lower or title
        #[arg(long)]
        case: Option<String>,

        /// Append sequential numbers
        #[arg(long)]
        number: bool,

        #[arg(long, requires = "number")]
        number_prefix: bool,

        #[arg(long, default_value = "1")]
        start: u32,

        #[arg(long, default_value = "2")]
        padding: usize,
    },

    /// Replace special characters in the selected names
    CleanNames {
        #[arg(long)]
        select: String,
    },

    /// Rename armature bones between Mixamo and VRM conventions
    ConvertRig {
        #[arg(long)]
        object: String,

        /// auto, vrm or mixamo
        #[arg(short, long, default_value = "auto")]
        direction: RigDirection,
    },

    /// Print the blueprint of a .hyp container
    HypInfo {
        path: PathBuf,

        #[arg(long)]
        override_privilege: bool,
    },

    /// Import a .hyp container into the scene
    ImportHyp {
        path: PathBuf,

        #[arg(long)]
        override_privilege: bool,

        /// Directory to write the embedded script into
        #[arg(long)]
        script_dir: Option<PathBuf>,
    },

    /// Export the selection to one GLB, or every top-level object with --all
    ExportGlb {
        path: PathBuf,

        #[arg(long)]
        select: Option<String>,

        /// Treat PATH as a directory and write one file per object
        #[arg(long)]
        all: bool,
    },

    /// Set the physics type of named rigidbodies
    SetType {
        #[arg(value_name = "TYPE")]
        body_type: PhysicsType,

        /// Comma-separated rigidbody names
        targets: String,
    },

    /// Flip a mesh or collider flag on named objects
    Toggle {
        /// castShadow, receiveShadow, convex or trigger
        flag: String,

        targets: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = tool_config(&cli)?;

    if let Commands::HypInfo {
        path,
        override_privilege,
    } = &cli.command
    {
        return print_hyp_info(path, *override_privilege);
    }

    let scene = match &cli.scene {
        Some(path) => load_scene_from_file(path)
            .with_context(|| format!("Failed to load scene {}", path.display()))?,
        None => SceneState::new(),
    };
    let mut app = App::new(config).with_scene(scene);
    let mut codecs = Codecs::default();

    let modified = run(&mut app, &mut codecs, cli.command)?;

    if modified {
        match cli.output.as_ref().or(cli.scene.as_ref()) {
            Some(path) => {
                save_scene_to_file(&app.scene, path)
                    .with_context(|| format!("Failed to write scene {}", path.display()))?;
                log::info!("Scene written to {}", path.display());
            }
            None => log::warn!("No --scene or --output given, changes discarded"),
        }
    }
    Ok(())
}

fn tool_config(cli: &Cli) -> Result<ToolConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ToolConfig::default(),
    };
    if let Some(mass) = cli.mass {
        config.mass = mass;
    }
    if let Some(physics_type) = cli.physics_type {
        config.physics_type = physics_type;
    }
    if let Some(collider_type) = cli.collider_type {
        config.collider_type = collider_type;
    }
    config.validate().context("Invalid tool settings")?;
    Ok(config)
}

/// Returns whether the scene changed.
fn run(app: &mut App, codecs: &mut Codecs, command: Commands) -> Result<bool> {
    let command = match command {
        Commands::Inspect => {
            println!("{}", app.ui.summary());
            return Ok(false);
        }
        Commands::Group { select } => {
            let candidates = match select {
                Some(names) => resolve_names(&app.scene, &names)?,
                None => app
                    .scene
                    .top_level()
                    .into_iter()
                    .filter(|id| app.scene.get(*id).is_some_and(|object| object.is_mesh()))
                    .collect(),
            };
            for group in group_variants(&app.scene, &candidates) {
                let names: Vec<&str> = group
                    .variants
                    .iter()
                    .filter_map(|id| app.scene.name_of(*id))
                    .collect();
                println!(
                    "{} (key {}): {}",
                    group.base_name,
                    app.scene.name_of(group.key).unwrap_or_default(),
                    names.join(", ")
                );
            }
            return Ok(false);
        }
        Commands::Rigidbodies { select } => {
            select_names(&mut app.scene, &select)?;
            SceneCommand::CreateRigidbodies
        }
        Commands::Rigidbody { select } => {
            if let Some(names) = select {
                select_names(&mut app.scene, &names)?;
            }
            SceneCommand::CreateRigidbody
        }
        Commands::Snap { object, vertices } => {
            select_names(&mut app.scene, &object)?;
            let vertices = vertices
                .map(|list| {
                    list.split(',')
                        .map(|index| index.trim().parse::<usize>())
                        .collect::<std::result::Result<Vec<_>, _>>()
                })
                .transpose()
                .context("Vertex indices must be non-negative integers")?;
            SceneCommand::AddSnapPoints { vertices }
        }
        Commands::Rename {
            select,
            find,
            replace,
            prefix,
            remove_prefix,
            suffix,
            remove_suffix,
            case,
            number,
            number_prefix,
            start,
            padding,
        } => {
            select_names(&mut app.scene, &select)?;
            let affix = |remove: bool| {
                if remove {
                    AffixOperation::Remove
                } else {
                    AffixOperation::Add
                }
            };
            let case = match case.as_deref().map(str::to_ascii_lowercase).as_deref() {
                None => None,
                Some("upper") => Some(CaseConversion::Upper),
                Some("lower") => Some(CaseConversion::Lower),
                Some("title") => Some(CaseConversion::Title),
                Some(other) => bail!("Unknown case conversion '{}'", other),
            };
            let options = RenameOptions {
                find_replace: find.zip(replace),
                prefix: prefix.map(|value| (affix(remove_prefix), value)),
                suffix: suffix.map(|value| (affix(remove_suffix), value)),
                case,
                numbering: number.then(|| Numbering {
                    position: if number_prefix {
                        NumberPosition::Prefix
                    } else {
                        NumberPosition::Suffix
                    },
                    start,
                    padding,
                    ..Numbering::default()
                }),
            };
            SceneCommand::BatchRename { options }
        }
        Commands::CleanNames { select } => {
            select_names(&mut app.scene, &select)?;
            SceneCommand::CleanNames
        }
        Commands::ConvertRig { object, direction } => {
            select_names(&mut app.scene, &object)?;
            SceneCommand::ConvertRig { direction }
        }
        Commands::HypInfo { .. } => return Ok(false),
        Commands::ImportHyp {
            path,
            override_privilege,
            script_dir,
        } => {
            let outcome = app.execute(
                SceneCommand::ImportHyp {
                    path,
                    override_privilege,
                },
                codecs,
            )?;
            report(outcome);
            if let (Some(directory), Some(script)) = (script_dir, app.scripts.last()) {
                let target = directory.join(&script.name);
                std::fs::write(&target, &script.text)
                    .with_context(|| format!("Failed to write script {}", target.display()))?;
                log::info!("Script written to {}", target.display());
            }
            return Ok(true);
        }
        Commands::ExportGlb { path, select, all } => {
            let command = if all {
                SceneCommand::ExportAllGlb { directory: path }
            } else {
                if let Some(names) = select {
                    select_names(&mut app.scene, &names)?;
                }
                SceneCommand::ExportGlb { path }
            };
            report(app.execute(command, codecs)?);
            return Ok(false);
        }
        Commands::SetType { body_type, targets } => {
            SceneCommand::SetRigidbodyType { body_type, targets }
        }
        Commands::Toggle { flag, targets } => match (
            flag.parse::<MeshFlag>(),
            flag.parse::<ColliderFlag>(),
        ) {
            (Ok(flag), _) => SceneCommand::ToggleMeshFlag { flag, targets },
            (_, Ok(flag)) => SceneCommand::ToggleColliderFlag { flag, targets },
            _ => bail!("Unknown flag '{}'", flag),
        },
    };

    report(app.execute(command, codecs)?);
    println!("{}", app.ui.summary());
    Ok(true)
}

fn report(outcome: CommandOutcome) {
    if let CommandOutcome::Message(message) = outcome {
        println!("{}", message);
    }
}

/// Every object carrying one of the names, each id once.
fn resolve_names(scene: &SceneState, names: &str) -> Result<Vec<ObjectId>> {
    let mut resolved: Vec<ObjectId> = Vec::new();
    for name in names.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let found = scene.find_all_by_name(name);
        if found.is_empty() {
            bail!("No object named '{}'", name);
        }
        for id in found {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
    }
    Ok(resolved)
}

/// Selects the named objects; the first one becomes active.
fn select_names(scene: &mut SceneState, names: &str) -> Result<()> {
    let ids = resolve_names(scene, names)?;
    scene.set_active(ids.first().copied());
    scene.set_selection(ids);
    Ok(())
}

fn print_hyp_info(path: &Path, override_privilege: bool) -> Result<()> {
    let contents = hyp::read_hyp_file(path, override_privilege)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let blueprint = &contents.blueprint;
    println!("Header size: {} bytes", contents.header_size);
    println!("Name:        {}", blueprint.display_name());
    println!("Version:     {}", blueprint.version);
    println!("Author:      {}", blueprint.author.as_deref().unwrap_or("-"));
    println!("Frozen:      {}", blueprint.frozen);
    println!(
        "Props:       interact={} clickDistance={} collision={} visible={}",
        blueprint.props.interact,
        blueprint.props.click_distance,
        blueprint.props.collision,
        blueprint.props.visible
    );
    match &contents.model {
        hyp::ModelPayload::Glb(bytes) => println!("Model:       {} bytes", bytes.len()),
        hyp::ModelPayload::Frozen => println!("Model:       withheld (frozen)"),
    }
    if let Some(script) = &contents.script {
        println!("Script:      {} ({} bytes)", script.name, script.text.len());
    }
    Ok(())
}

//! Alpaca telescope server for alt/az digital setting circles.

use std::path::PathBuf;
use std::sync::Arc;

use alpaca_dsc::{Profile, ProfileStore, ServerArgs, SystemClock, TelescopeDevice};
use anyhow::{bail, Context};
use clap::Parser;
use encoders::{DriverRegistry, SimulatorEncoders};
use ephemeris::SiderealTransform;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Alpaca telescope server for alt/az digital setting circles",
    long_about = "Reports the pointing of a manually moved alt/az telescope through the \
        Alpaca Telescope REST interface.\n\n\
        Pointing comes from incremental encoders read over a serial link. After a \
        planetarium program syncs the telescope on a known star, altitude, azimuth, \
        right ascension and declination track the encoder counts.\n\n\
        Profiles holding the site and encoder settings live in ~/.config/alpacadsc/."
)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    #[arg(
        long,
        help = "Profile to load",
        long_help = "Name of the stored profile to load. It becomes the current profile \
            for later runs. Without this flag the current profile is used."
    )]
    profile: Option<String>,

    #[arg(long, help = "List stored profiles and exit")]
    list_profiles: bool,

    #[arg(
        long,
        value_name = "NAME",
        help = "Create a default profile and exit",
        long_help = "Store a new profile with default settings (simulator encoders) and make \
            it the current profile. Its encoders and site can then be edited through the \
            JSON setup API at /setup/v1/telescope/0/setup."
    )]
    new_profile: Option<String>,

    #[arg(
        long,
        help = "Profile directory",
        long_help = "Directory holding profiles and current_profile.json. \
            Default: ~/.config/alpacadsc"
    )]
    config_dir: Option<PathBuf>,

    #[arg(
        long,
        help = "Use simulated encoders",
        long_help = "Replace the profile's encoder driver with the simulator. Site changes \
            made by clients are not saved in this mode."
    )]
    simul: bool,

    #[arg(long, help = "Enable debug logging")]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn list_profiles(store: &ProfileStore) -> anyhow::Result<()> {
    let current = store.current_profile()?;
    let names = store.list_profiles()?;
    if names.is_empty() {
        println!("No profiles in {}", store.root_path().display());
        return Ok(());
    }
    for name in names {
        let marker = if current.as_deref() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {name}");
    }
    Ok(())
}

fn new_profile(store: &ProfileStore, name: &str) -> anyhow::Result<()> {
    if store.exists(name) {
        bail!("Profile {name:?} already exists");
    }
    let path = store
        .save(&Profile::new(name))
        .with_context(|| format!("Failed to create profile {name:?}"))?;
    store
        .set_current_profile(name)
        .context("Failed to record current profile")?;
    println!("Created profile {name:?} at {}", path.display());
    Ok(())
}

fn load_profile(store: &ProfileStore, args: &Args) -> anyhow::Result<Profile> {
    let name = match &args.profile {
        Some(name) => Some(name.clone()),
        None => store
            .current_profile()
            .context("Failed to read current profile")?,
    };

    match name {
        Some(name) => {
            let profile = store
                .load(&name)
                .with_context(|| format!("Failed to load profile {name:?}"))?;
            if args.profile.is_some() {
                store
                    .set_current_profile(&name)
                    .context("Failed to record current profile")?;
            }
            Ok(profile)
        }
        None if args.simul => {
            warn!("No profile selected, using default simulator profile");
            Ok(Profile::new("simulator"))
        }
        None => bail!(
            "No profile selected; pass --profile <name> (stored profiles: {:?})",
            store.list_profiles().unwrap_or_default()
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let store = match &args.config_dir {
        Some(dir) => ProfileStore::with_path(dir.clone()),
        None => ProfileStore::new().context("Failed to locate profile directory")?,
    };

    if args.list_profiles {
        return list_profiles(&store);
    }
    if let Some(name) = &args.new_profile {
        return new_profile(&store, name);
    }

    let mut profile = load_profile(&store, &args)?;
    let registry = DriverRegistry::with_builtin_drivers();
    info!(
        "Profile {:?}: driver {} on {:?}, site {:.4}, {:.4}",
        profile.name,
        profile.encoders.driver,
        profile.encoders.serial_port,
        profile.location.latitude,
        profile.location.longitude
    );

    let mut device = TelescopeDevice::new(
        registry,
        Arc::new(SiderealTransform::new()),
        Arc::new(SystemClock),
    );

    if args.simul {
        info!("Using simulated encoders");
        profile.encoders.driver = SimulatorEncoders::NAME.to_string();
    } else {
        if !device.registry().contains(&profile.encoders.driver) {
            warn!(
                "Profile driver {:?} is not one of {:?}; connect will fail",
                profile.encoders.driver,
                device.registry().names()
            );
        }
        device = device.with_store(store);
    }
    let device = Arc::new(device.with_profile(profile));

    alpaca_dsc::run_server(device, args.server).await
}

use std::error::Error;
use std::path::PathBuf;

use bpaf::{Bpaf, Parser};
use sayo_protocol::{DeviceIdentity, ProtocolConstants};
use tracing_subscriber::EnvFilter;

use crate::capture::CaptureOptions;
use crate::config::Config;
use crate::detection::{identity_args, IdentityArgs};

mod capture;
mod config;
mod detection;

#[derive(Clone, Debug, Default, Bpaf)]
struct CaptureArgs {
    /// Exit after capturing N frames
    #[bpaf(long, argument("N"))]
    frames: Option<u64>,
    /// Keep retrying when the device is missing or goes away
    #[bpaf(short, long)]
    reconnect: bool,
    /// How often to log frame rate and packet statistics
    #[bpaf(long("stats-interval"), argument("DURATION"))]
    stats_interval: Option<humantime::Duration>,
}

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version, descr(env!("CARGO_PKG_DESCRIPTION")))]
struct Cli {
    /// Use a config file other than the default one
    #[bpaf(long, argument("PATH"))]
    config: Option<PathBuf>,
    #[bpaf(external(identity_args))]
    identity: IdentityArgs,
    #[bpaf(external(command))]
    command: Command,
}

#[derive(Clone, Debug)]
enum Command {
    /// List HID collections of matching devices.
    Devices,
    /// Print the screen parameters reported by the device.
    Info,
    /// Mirror the screen until interrupted (default).
    Capture(CaptureArgs),
}

fn command() -> impl Parser<Command> {
    let devices = bpaf::pure(Command::Devices)
        .to_options()
        .descr("List HID collections of matching devices")
        .command("devices")
        .help("List HID collections of matching devices");

    let info = bpaf::pure(Command::Info)
        .to_options()
        .descr("Print the screen parameters reported by the device")
        .command("info")
        .help("Print the screen parameters reported by the device");

    let capture = capture_args()
        .map(Command::Capture)
        .to_options()
        .descr("Mirror the screen until interrupted")
        .command("capture")
        .help("Mirror the screen until interrupted (default)");

    bpaf::construct!([devices, info, capture]).fallback(Command::Capture(CaptureArgs::default()))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = cli().run();
    let config = match &cli.config {
        Some(path) => Config::load_or_create_at(path)?,
        None => Config::load_or_create()?,
    };
    init_logging(&config.logging.level);

    let identity = cli.identity.apply(DeviceIdentity::from(&config.device));
    let proto = ProtocolConstants::from(&config.protocol);

    match cli.command {
        Command::Devices => detection::list_devices(&identity),
        Command::Info => detection::print_info(&identity, &proto),
        Command::Capture(args) => {
            let mut options = CaptureOptions::from(&config.capture);
            options.frames = args.frames;
            options.reconnect |= args.reconnect;
            if let Some(interval) = args.stats_interval {
                options.stats_interval = interval.into();
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(capture::run(identity, proto, options))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_capture() {
        let no_args: &[&str] = &[];
        let parsed = cli().run_inner(no_args).unwrap();
        assert!(matches!(parsed.command, Command::Capture(ref args) if args.frames.is_none()));
        assert_eq!(parsed.identity, IdentityArgs::default());
    }

    #[test]
    fn parses_overrides() {
        let parsed = cli()
            .run_inner(&["--vid", "0x8089", "--pid", "9", "capture", "--frames", "3", "-r"])
            .unwrap();
        assert_eq!(parsed.identity.vendor_id, Some(detection::HexId(0x8089)));
        assert_eq!(parsed.identity.product_id, Some(detection::HexId(9)));
        let Command::Capture(args) = parsed.command else {
            panic!("expected capture");
        };
        assert_eq!(args.frames, Some(3));
        assert!(args.reconnect);

        assert!(cli().run_inner(&["--vid", "nope", "devices"]).is_err());
    }

    #[test]
    fn markdown_docs_cover_commands() {
        let app = env!("CARGO_PKG_NAME");
        let md = cli().header("").render_markdown(app);
        for cmd in ["devices", "info", "capture", "--vid"] {
            assert!(md.contains(cmd), "docs missing {cmd}");
        }
    }
}

use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::error::Error;
use crate::local_k8s::exec::FailurePolicy;
use crate::local_k8s::pods::TargetSelector;

pub struct PodCli {
    pub namespace: String,
    pub pod_name: Option<String>,
    pub container: Option<String>,
    pub labels: Option<String>,
    pub wait_timeout: Duration,
    pub fail_on: FailurePolicy,
    pub verbose: bool,
    pub command: Vec<String>,
}

impl PodCli {
    /// Parses the process arguments. `--help` and `--version` print and exit
    /// as usual; any other parse failure comes back as [`Error::Usage`].
    pub fn try_new() -> Result<Self, Error> {
        Self::try_parse_from(std::env::args_os())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Self::command().try_get_matches_from(args) {
            Ok(matches) => Ok(Self::from_matches(&matches)),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => e.exit(),
                _ => Err(Error::Usage(usage_message(&e))),
            },
        }
    }

    pub fn command() -> Command {
        Command::new("kube-pod-exec")
            .version("v0.1.0")
            .about("Run a command in a running pod and print its output as JSON")
            .override_usage("kube-pod-exec [OPTIONS] <COMMAND>...")
            .arg(
                Arg::new("namespace")
                    .short('n')
                    .long("ns")
                    .default_value("default")
                    .help("namespace of the target pod"),
            )
            .arg(
                Arg::new("pod")
                    .short('p')
                    .long("pn")
                    .help("pod name, takes precedence over labels"),
            )
            .arg(
                Arg::new("container")
                    .short('c')
                    .long("cn")
                    .help("container name"),
            )
            .arg(
                Arg::new("labels")
                    .short('l')
                    .long("labels")
                    .help("label selector, e.g. app=mysql,version=v1.1.2"),
            )
            .arg(
                Arg::new("wait")
                    .short('w')
                    .long("wp")
                    .default_value("1m")
                    .value_parser(humantime::parse_duration)
                    .help("how long to wait for a running pod, 0 to try once"),
            )
            .arg(
                Arg::new("fail-on")
                    .long("fail-on")
                    .default_value("stderr")
                    .value_parser(["stderr", "exit-status"])
                    .help("treat stderr output or a non-zero exit status as failure"),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .action(ArgAction::SetTrue)
                    .help("debug logging on stderr"),
            )
            .arg(
                Arg::new("cmd")
                    .value_name("COMMAND")
                    .num_args(1..)
                    .required(true)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true)
                    .help("command to run in the container"),
            )
    }

    pub fn from_matches(matches: &ArgMatches) -> Self {
        let text = |id: &str| matches.get_one::<String>(id).cloned();
        let fail_on = match matches.get_one::<String>("fail-on").map(String::as_str) {
            Some("exit-status") => FailurePolicy::ExitStatus,
            _ => FailurePolicy::Stderr,
        };

        Self {
            namespace: text("namespace").unwrap_or_else(|| "default".to_string()),
            pod_name: text("pod"),
            container: text("container"),
            labels: text("labels"),
            wait_timeout: matches
                .get_one::<Duration>("wait")
                .copied()
                .unwrap_or(Duration::from_secs(60)),
            fail_on,
            verbose: matches.get_flag("verbose"),
            command: matches
                .get_many::<String>("cmd")
                .map(|args| args.cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Validates the pod flags without touching the cluster.
    pub fn selector(&self) -> Result<TargetSelector, Error> {
        TargetSelector::from_flags(
            self.pod_name.as_deref(),
            self.labels.as_deref(),
            self.container.as_deref(),
        )
        .ok_or(Error::EmptySelector)
    }
}

/// First paragraph of clap's rendered error, on one line and without the
/// leading `error: `.
fn usage_message(e: &clap::Error) -> String {
    let rendered = e.to_string();
    let head = rendered.split("\n\n").next().unwrap_or_default();
    let head = head.trim().trim_start_matches("error:").trim();
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

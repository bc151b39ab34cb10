use std::error::Error;
use std::path::PathBuf;

use clap::{App, Arg};
use slog::{error, info};

use egal::setup::init_logger;
use egal::{ReplicaConf, Server};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("egal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = App::new("egal")
        .version("0.1.0")
        .about("leaderless replicated key-value store")
        .arg(
            Arg::with_name("conf")
                .long("conf")
                .takes_value(true)
                .help("replica config in yaml"),
        )
        .arg(
            Arg::with_name("workload")
                .long("workload")
                .takes_value(true)
                .help("generic, inventory or social; overrides the config"),
        )
        .arg(
            Arg::with_name("listen")
                .long("listen")
                .takes_value(true)
                .help("client api address, e.g. 127.0.0.1:7070; overrides the config"),
        )
        .arg(
            Arg::with_name("log")
                .long("log")
                .takes_value(true)
                .help("log file path; logs to stderr if absent"),
        )
        .get_matches();

    let mut conf = match matches.value_of("conf") {
        Some(path) => ReplicaConf::from_file(path)?,
        None => ReplicaConf::default(),
    };

    if let Some(w) = matches.value_of("workload") {
        conf.workload = ReplicaConf::parse_workload(w)?;
    }
    if let Some(addr) = matches.value_of("listen") {
        conf.listen = addr.parse()?;
    }
    if let Some(p) = matches.value_of("log") {
        conf.log_path = Some(PathBuf::from(p));
    }
    conf.check()?;

    let logger = init_logger(conf.log_path.as_deref())?;
    info!(logger, "starting"; "conf" => ?conf);

    let mut server = Server::new(conf, &logger);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!(logger, "interrupted, stopping");

    server.stop()?;
    if let Err(e) = server.join().await {
        error!(logger, "join"; "error" => %e);
    }
    Ok(())
}

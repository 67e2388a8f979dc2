use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ds_client::Task;
use ds_drone::{ChannelLink, DroneConfig, DroneEvent, VideoPacket};
use ds_flight::FlightSequencer;
use ds_inference::{CommandDispatcher, DispatcherKind, InferenceClient, LinkDispatcher, NoopDispatcher};
use ds_scheduler::Scheduler;
use ds_video::{Decoder, FrameSampler, FrameSink, WorkDir};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[macro_use]
extern crate tracing;

mod cli;
mod config;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // setup colorful backtraces
    color_backtrace::install();

    let mut targets = tracing_subscriber::filter::Targets::new().with_default(LevelFilter::INFO);

    if let Ok(directives) = std::env::var("RUST_LOG") {
        for directive in directives.split(',') {
            if let Some((target, level)) = directive.split_once('=') {
                targets = targets.with_target(
                    target,
                    level.parse::<LevelFilter>().context("invalid log level")?,
                );
            } else {
                targets = targets.with_default(
                    directive
                        .parse::<LevelFilter>()
                        .context("invalid log level")?,
                );
            }
        }
    }

    let (writer, _guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::hourly("logs", "drone-system"));

    let reg = tracing_subscriber::registry();

    #[cfg(tokio_unstable)]
    let reg = reg.with(console_subscriber::spawn());

    reg
        // writer that outputs to console
        .with(tracing_subscriber::fmt::layer().with_filter(targets))
        // writer that outputs to files
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(Targets::new().with_targets(vec![
                    ("drone_system", LevelFilter::DEBUG),
                    ("ds_drone", LevelFilter::DEBUG),
                    ("ds_flight", LevelFilter::DEBUG),
                    ("ds_inference", LevelFilter::DEBUG),
                    ("ds_scheduler", LevelFilter::DEBUG),
                    ("ds_video", LevelFilter::DEBUG),
                ])),
        )
        .init();

    let main_args: cli::args::MainArgs = cli::args::MainArgs::parse();

    debug!("reading config from {:?}", &main_args.config);
    let config = crate::config::DroneSystemConfig::read_from_path(main_args.config)
        .context("failed to read config file")?;

    run_tasks(config).await
}

async fn run_tasks(config: crate::config::DroneSystemConfig) -> anyhow::Result<()> {
    let cancellation_token = CancellationToken::new();

    ctrlc::set_handler({
        let cancellation_token = cancellation_token.clone();
        move || {
            info!("received interrupt, shutting down");
            cancellation_token.cancel();
        }
    })
    .context("could not set ctrl+c handler")?;

    // removed when this function returns
    let workdir = WorkDir::create("drone-system").context("failed to create working directory")?;
    info!("decoded frames go to {}", workdir.path().display());

    let mut tasks = Vec::<Box<dyn Task + Send>>::new();

    debug!("initializing decoder task");
    let (decoder, decoder_input) =
        Decoder::spawn(&config.decoder, workdir.path()).context("failed to start decoder")?;
    tasks.push(Box::new(ds_video::create_task(decoder)));

    debug!("initializing drone task");
    let (link, drone_evt_rx, drone_video_rx): (
        ChannelLink,
        flume::Receiver<DroneEvent>,
        flume::Receiver<VideoPacket>,
    ) = match config.drone {
        DroneConfig::Tello(c) => {
            let task = ds_drone::tello::create_task(c).context("failed to initialize tello task")?;
            let channels = (task.link(), task.events(), task.video());
            tasks.push(Box::new(task));
            channels
        }
        DroneConfig::Simulated(c) => {
            let task = ds_drone::simulated::create_task(c)
                .context("failed to initialize simulated drone task")?;
            let channels = (task.link(), task.events(), task.video());
            tasks.push(Box::new(task));
            channels
        }
    };

    debug!("initializing inference task");
    let client =
        InferenceClient::new(&config.inference).context("failed to initialize inference client")?;
    let dispatcher: Box<dyn CommandDispatcher> = match config.inference.dispatcher {
        DispatcherKind::Noop => Box::new(NoopDispatcher),
        DispatcherKind::Command => Box::new(LinkDispatcher::new(link.clone())),
    };
    let inference_task = ds_inference::create_task(client, dispatcher);
    let frame_slot = inference_task.frames();
    tasks.push(Box::new(inference_task));

    debug!("initializing scheduler");
    let scheduler = Scheduler::new(cancellation_token.child_token());

    let sequencer = FlightSequencer::new(config.flight, Arc::new(link), scheduler.clone());
    scheduler.listen("flight/events", drone_evt_rx, sequencer);
    scheduler.listen("video/sink", drone_video_rx, FrameSink::new(decoder_input));
    scheduler
        .every(
            "video/sampler",
            config.sampler.period,
            FrameSampler::new(workdir.path(), frame_slot),
        )
        .context("failed to start frame sampler")?;

    tasks.push(Box::new(scheduler));

    let mut join_set = JoinSet::new();

    for task in tasks {
        debug!("starting {} task", task.name());
        join_set.spawn(task.run(cancellation_token.clone()));
    }

    while let Some(res) = join_set.join_next().await {
        // if task panicked, then will be Some(Err)
        // if task terminated w/ error, then will be Some(Ok(Err))
        // need to propagate errors in both cases

        match res {
            Err(err) => {
                cancellation_token.cancel();
                return Err(err).context("task failed");
            }
            Ok(Err(err)) => {
                cancellation_token.cancel();
                return Err(err).context("task terminated with error");
            }
            _ => {
                info!("exited task");
            }
        }
    }

    Ok(())
}

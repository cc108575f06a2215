use std::process::ExitCode;

use log::{error, info};
use tokio::fs::File;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use rtp_sink::actors::renderer_actor::RendererActorHandle;
use rtp_sink::actors::session_actor::SessionActorHandle;
use rtp_sink::actors::udp_io_actor::UdpTransport;
use rtp_sink::config::{Config, RendererOutput};

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let sink: Sink = match &config.renderer_output {
        RendererOutput::Stdout => Box::new(tokio::io::stdout()),
        RendererOutput::File(path) => match File::create(path).await {
            Ok(file) => Box::new(file),
            Err(err) => {
                error!("Could not open renderer output {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
    };

    // The renderer is created on the session's first source
    let mut sink = Some(sink);
    let (task_sender, renderer_task) = oneshot::channel::<JoinHandle<()>>();
    let mut task_sender = Some(task_sender);
    let reorder_depth = config.reorder_depth;
    let renderer_factory = move || {
        let (renderer, task) =
            RendererActorHandle::spawn(sink.take().unwrap_or_else(discard), reorder_depth);
        if let Some(task_sender) = task_sender.take() {
            let _ = task_sender.send(task);
        }
        renderer
    };

    let session = SessionActorHandle::new(
        UdpTransport::default(),
        renderer_factory,
        config.report_interval,
    );
    session.start(config.source_host.clone(), config.source_port);

    let stop_handle = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stopping session");
            stop_handle.stop();
        }
    });

    let result = session.wait().await;

    // The session has dropped its renderer; let it write out what is pending
    if let Ok(task) = renderer_task.await {
        if let Err(err) = task.await {
            error!("Renderer failed: {}", err);
        }
    }

    match result {
        Ok(stats) => {
            info!(
                "Forwarded {} of {} datagrams from {}",
                stats.forwarded, stats.datagrams, config.source_host
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Session failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn discard() -> Sink {
    Box::new(tokio::io::sink())
}

use ferrite::config::Config;
use ferrite::http::response::Response;
use ferrite::server::{Call, Controller};

async fn hello(call: Call) -> Response {
    let target = call.message.head.target().unwrap_or("/").to_string();
    Response::ok(format!("Hello from Ferrite at {target}\n"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let controller = Controller::bind(&cfg, hello).await?;
    let shutdown = controller.shutdown_handle();
    let mut server = tokio::spawn(controller.run());

    tokio::select! {
        res = &mut server => {
            res??;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shutdown.shutdown();
            server.await??;
        }
    }

    Ok(())
}

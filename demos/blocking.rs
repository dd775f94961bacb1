//! Drives calls from plain threads through the blocking client.
//! Run with: cargo run --example blocking

use std::sync::Arc;
use std::thread;
use steadycall::{BlockingClient, Coordinator, Dispatch, Endpoint, OutboundRequest};
use steadycall_core::{ServiceInstance, TransportError};
use steadycall_loadbalancer::StaticDirectory;
use tower::service_fn;

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let directory = StaticDirectory::new().with_service(
        "reports",
        (1..=3).map(|i| ServiceInstance::new(format!("10.30.{i}.5"), 9000)),
    );
    let transport = service_fn(|dispatch: Dispatch<()>| async move {
        println!("{} <- {}", dispatch.instance, dispatch.correlation_id);
        Ok::<u16, TransportError>(200)
    });

    let client = Arc::new(BlockingClient::new(
        Coordinator::builder("reports", directory).build(transport),
    )?);

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                let request = OutboundRequest::empty("reports", Endpoint::get("/daily"))
                    .with_correlation_id(format!("worker-{worker}"));
                client.invoke(request)
            })
        })
        .collect();

    for worker in workers {
        match worker.join() {
            Ok(result) => println!("{result:?}"),
            Err(_) => eprintln!("worker panicked"),
        }
    }
    Ok(())
}

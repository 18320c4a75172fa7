use hookfeed::{
    ws::{ConnectionEvent, EventKind},
    Session,
};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let channel = std::env::args().nth(1).unwrap_or_else(|| "events".to_string());

    let session = Session::from_env()
        .map_err(|e| {
            println!("Invalid HOOKFEED_* config: {}", e);
            std::process::exit(1);
        })
        .unwrap();

    let view = match channel.as_str() {
        "activity" => session.activity_view(),
        _ => session.events_view(),
    }
    .unwrap();

    view.connection().on(EventKind::MaxReconnectAttemptsReached, |_: &ConnectionEvent| {
        log::error!("Push channel gave up reconnecting");
    });

    match view.store().refresh().await {
        Ok(outcome) => log::info!(
            "First page {:?}, {} items",
            outcome,
            view.store().snapshot().items.len()
        ),
        Err(e) => log::warn!("Load first page failed: {}", e),
    }

    let mut state = view.subscribe();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let pending = state.borrow().pending;
                log::info!("{} new items on {}", pending, channel);

                if pending >= 5 {
                    match view.acknowledge().await {
                        Ok(_) => log::info!("Reloaded, {} items", view.store().items().len()),
                        Err(e) => log::warn!("Reload failed: {}", e),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    view.connection().close();
}

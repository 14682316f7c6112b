#[cfg(test)]
#[path = "host_stream_test.rs"]
mod tests;

use tokio::sync::broadcast::error::RecvError;

use crate::domain::models::AiError;
use crate::domain::models::FragmentSender;
use crate::domain::models::GenerationParams;
use crate::domain::models::HostBridge;
use crate::domain::models::HostEvent;

const HOST: &str = "Host";

/// Runs one host generation and forwards its tokens into `tx`.
///
/// The subscription is opened before the generation is started so no early
/// token is missed. Events for other generation ids are skipped. The sequence
/// ends on `Finished`; a rejected start ends it with the host's error.
pub async fn host_stream(
    host: &(dyn HostBridge + Send + Sync),
    params: GenerationParams,
    tx: &FragmentSender,
) -> Result<(), AiError> {
    let id = params.id;
    let mut events = host.subscribe();

    let start = host.start_generation(params);
    tokio::pin!(start);
    let mut started = false;

    loop {
        tokio::select! {
            res = &mut start, if !started => {
                res?;
                started = true;
            }
            event = events.recv() => {
                match event {
                    Ok(event) if event.generation_id() != id => {}
                    Ok(HostEvent::Token { token, .. }) => {
                        tx.send(token).await?;
                    }
                    Ok(HostEvent::Finished { .. }) => {
                        return Ok(());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::error!(id, skipped, "Host event subscriber fell behind");
                        return Err(AiError::network(
                            HOST,
                            format!("missed {skipped} generation events"),
                        ));
                    }
                    Err(RecvError::Closed) => {
                        return Err(AiError::network(HOST, "event channel closed"));
                    }
                }
            }
        }
    }
}

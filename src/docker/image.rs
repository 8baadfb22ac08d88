//! Image availability.

use tracing::{debug, info, instrument};

use super::{DaemonClient, is_not_found};
use crate::error::{Error, Result};

/// Makes sure `image` is present on the daemon, pulling it when it is not.
///
/// Safe to call before every container creation.
///
/// # Errors
///
/// Returns `Error::Daemon` if the image cannot be inspected or pulled.
#[instrument(skip(client))]
pub async fn ensure_image(client: &dyn DaemonClient, image: &str) -> Result<()> {
    match client.inspect_image(image).await {
        Ok(()) => {
            debug!("Image already present");
            Ok(())
        }
        Err(err) if is_not_found(&err) => {
            info!("Pulling image '{image}'");
            client
                .pull_image(image)
                .await
                .map_err(Error::daemon("pull image", image))
        }
        Err(err) => Err(Error::daemon("inspect image", image)(err)),
    }
}

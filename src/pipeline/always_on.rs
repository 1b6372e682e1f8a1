//! Always-on (24/7) channels: a pointer per channel, metadata optional.

use super::runner::Runner;
use super::stats::ItemOutcome;
use crate::enrichment::Lookup;
use crate::model::ClassifiedItem;
use crate::organizer::MediaKey;

impl Runner {
    pub(super) async fn process_always_on(&self, item: ClassifiedItem) -> ItemOutcome {
        let ctx = &self.ctx;
        let paths = ctx.materializer.paths(&MediaKey::for_item(&item, None));

        let outcome = ctx
            .materializer
            .write_pointer(&paths.pointer, &ctx.playback_url(&item.item))
            .await;
        if !outcome.is_ok() || !ctx.config.tmdb.lookup_always_on {
            return outcome.into();
        }

        match ctx.resolver.search_any(&item.title).await {
            Lookup::Found(record) => {
                ctx.materializer.write_sidecar(&paths.sidecar, &record).await;
            }
            Lookup::NotFound => {
                tracing::debug!(target: "pipeline", "No TMDB match for channel '{}'", item.title);
            }
            Lookup::Failed(reason) => {
                tracing::debug!(target: "pipeline", "Channel lookup '{}' failed: {}", item.title, reason);
            }
        }
        outcome.into()
    }
}

use crate::utils::format_emoji;

/// User-facing notices raised by the cache.
pub trait Notifier: Send {
    /// Fired at most once per session, the first time a draw finds no usable
    /// credential.
    fn missing_credential(&self);

    fn seeds_fetched(&self, values: &[f64]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn missing_credential(&self) {
        log::warn!("TrueRNG is missing an API key in its settings; falling back to the built-in generator");
    }

    fn seeds_fetched(&self, values: &[f64]) {
        log::info!("{}", seed_report(values));
    }
}

/// One-line summary of a freshly fetched batch.
pub fn seed_report(values: &[f64]) -> String {
    let list = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} Seeds fetched ({} from random.org): {list}",
        format_emoji("🎲", 2),
        values.len()
    )
}

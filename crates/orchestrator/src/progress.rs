/// UI-free progress sink injected into a run so the core stays free of
/// any particular rendering choice; `cda-sync-cli` supplies an
/// `indicatif`-backed implementation, tests supply `NoopProgressSink`.
pub trait ProgressSink: Send + Sync {
    fn start(&self, total: usize);
    fn advance(&self, table: &str, n: u64);
    fn finish(&self, table: &str, ok: bool);
}

#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn start(&self, _total: usize) {}
    fn advance(&self, _table: &str, _n: u64) {}
    fn finish(&self, _table: &str, _ok: bool) {}
}

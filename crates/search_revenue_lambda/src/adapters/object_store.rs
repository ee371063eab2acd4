use std::io::Read;

/// Opens input objects as forward-only byte streams.
pub trait ObjectSource {
    fn open_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, String>;
}

pub trait ReportStore {
    fn write_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), String>;
}

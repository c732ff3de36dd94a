//! libcurl-backed transport for bundles and manifests.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::retry::TransferError;
use crate::storage::BundleWriter;

use super::transport::{ManifestSource, Transport};

/// Plain HTTP(S) GET via the curl crate. Follows redirects.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    user_agent: String,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            user_agent: format!("bpatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn easy(&self, url: &str, timeout: Duration) -> Result<curl::easy::Easy, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(self.connect_timeout.min(timeout))?;
        // Abort if throughput drops below 1 KiB/s for 30s; hard cap at the task timeout.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(30))?;
        easy.timeout(timeout)?;
        Ok(easy)
    }
}

fn check_status(easy: &mut curl::easy::Easy) -> Result<(), TransferError> {
    let code = easy.response_code().map_err(TransferError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }
    Ok(())
}

impl Transport for CurlTransport {
    fn fetch(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64, TransferError> {
        let writer = BundleWriter::create(dest).map_err(|e| {
            TransferError::Storage(std::io::Error::other(format!("{:#}", e)))
        })?;
        let writer = Arc::new(Mutex::new(Some(writer)));
        let writer_cb = Arc::clone(&writer);
        let storage_error: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));
        let storage_error_cb = Arc::clone(&storage_error);

        let mut easy = self.easy(url, timeout).map_err(TransferError::Curl)?;
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(move |data| {
                    let mut guard = writer_cb.lock().unwrap();
                    let Some(w) = guard.as_mut() else {
                        return Ok(0);
                    };
                    match w.write(data) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            storage_error_cb.lock().unwrap().replace(e);
                            Ok(0) // abort transfer
                        }
                    }
                })
                .map_err(TransferError::Curl)?;
            if let Err(e) = transfer.perform() {
                if e.is_write_error() {
                    if let Some(io_err) = storage_error.lock().unwrap().take() {
                        return Err(TransferError::Storage(io_err));
                    }
                }
                return Err(TransferError::Curl(e));
            }
        }
        check_status(&mut easy)?;

        let writer = writer
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransferError::Transport("writer already finalized".to_string()))?;
        if let Ok(expected) = easy.content_length_download() {
            let received = writer.written();
            if expected >= 0.0 && expected as u64 != received {
                return Err(TransferError::PartialTransfer {
                    expected: expected as u64,
                    received,
                });
            }
        }
        writer
            .finalize()
            .map_err(|e| TransferError::Storage(std::io::Error::other(format!("{:#}", e))))
    }
}

impl ManifestSource for CurlTransport {
    fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, TransferError> {
        let mut body: Vec<u8> = Vec::new();
        let mut easy = self.easy(url, timeout).map_err(TransferError::Curl)?;
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(TransferError::Curl)?;
            transfer.perform().map_err(TransferError::Curl)?;
        }
        check_status(&mut easy)?;
        String::from_utf8(body)
            .map_err(|e| TransferError::Transport(format!("manifest is not UTF-8: {}", e)))
    }
}

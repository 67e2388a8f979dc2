use std::{
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use ds_types::DecodedFrame;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::*;

use crate::InferenceConfig;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("could not read frame {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("inference request failed")]
    Request(#[from] reqwest::Error),
}

/// Uploads single frames to the inference endpoint and returns its reply.
pub struct InferenceClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    field_name: String,
}

impl InferenceClient {
    pub fn new(config: &InferenceConfig) -> anyhow::Result<Self> {
        let endpoint =
            reqwest::Url::from_str(&config.address).context("invalid inference endpoint url")?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build().context("failed to create http client")?,
            endpoint,
            field_name: config.field_name.clone(),
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    /// POSTs `frame` as a one-part multipart form. The part's file name is the
    /// path the decoder wrote the frame to.
    pub async fn infer(&self, frame: &DecodedFrame) -> Result<String, InferenceError> {
        let part = Part::bytes(frame.data.to_vec())
            .file_name(frame.path.to_string_lossy().into_owned())
            .mime_str(mime_type(&frame.path))?;

        // the file name is a full path, which must reach the service unescaped
        let form = Form::new()
            .percent_encode_noop()
            .part(self.field_name.clone(), part);

        trace!(
            "uploading {} ({} bytes) to {}",
            frame.path.display(),
            frame.data.len(),
            self.endpoint
        );

        let res = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let text = res.text().await?;

        debug!("inference for {}: '{text}'", frame.path.display());

        Ok(text)
    }

    /// Reads the image at `path` and uploads it. The file is left in place.
    pub async fn infer_file(&self, path: &Path) -> Result<String, InferenceError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| InferenceError::Read {
                path: path.to_owned(),
                source,
            })?;

        self.infer(&DecodedFrame::new(path, data)).await
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use futures::TryStreamExt;
    use warp::{http::StatusCode, hyper::body::Buf, multipart::FormData, Filter};

    use super::*;

    /// One multipart part as the test server saw it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Upload {
        pub name: String,
        pub filename: Option<String>,
        pub content_type: Option<String>,
        pub data: Vec<u8>,
    }

    /// Starts an inference endpoint on an ephemeral port. `reply` decides the
    /// response to the nth request.
    pub(crate) fn serve(
        reply: fn(usize) -> (StatusCode, &'static str),
    ) -> (SocketAddr, flume::Receiver<Vec<Upload>>) {
        let (tx, rx) = flume::unbounded();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let route = warp::post()
            .and(warp::multipart::form())
            .and_then(move |mut form: FormData| {
                let tx = tx.clone();
                let n = count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

                async move {
                    let mut uploads = Vec::new();

                    while let Some(mut part) = form.try_next().await.map_err(|_| warp::reject())? {
                        let mut data = Vec::new();
                        while let Some(Ok(buf)) = part.data().await {
                            data.extend_from_slice(buf.chunk());
                        }

                        uploads.push(Upload {
                            name: part.name().to_owned(),
                            filename: part.filename().map(ToOwned::to_owned),
                            content_type: part.content_type().map(ToOwned::to_owned),
                            data,
                        });
                    }

                    let _ = tx.send(uploads);
                    let (status, body) = reply(n);

                    Ok::<_, warp::Rejection>(warp::reply::with_status(body, status))
                }
            });

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        (addr, rx)
    }

    pub(crate) fn client_for(addr: SocketAddr) -> InferenceClient {
        InferenceClient::new(&InferenceConfig {
            address: format!("http://{addr}/"),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn uploads_frame_as_file_part() {
        let (addr, uploads) = serve(|_| (StatusCode::OK, "hover"));
        let client = client_for(addr);

        let frame = DecodedFrame::new("/tmp/frames/output_0001.png", b"not really a png".to_vec());
        let reply = client.infer(&frame).await.unwrap();

        assert_eq!(reply, "hover");
        assert_eq!(
            uploads.recv_async().await.unwrap(),
            vec![Upload {
                name: "file".to_owned(),
                filename: Some("/tmp/frames/output_0001.png".to_owned()),
                content_type: Some("image/png".to_owned()),
                data: b"not really a png".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let (addr, _uploads) = serve(|_| (StatusCode::INTERNAL_SERVER_ERROR, "boom"));
        let client = client_for(addr);

        let result = client
            .infer(&DecodedFrame::new("output_0001.png", vec![0]))
            .await;

        assert!(matches!(result, Err(InferenceError::Request(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = client_for(addr);

        let result = client
            .infer(&DecodedFrame::new("output_0001.png", vec![0]))
            .await;

        assert!(matches!(result, Err(InferenceError::Request(_))));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let route = warp::post().and_then(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok::<_, warp::Rejection>("too late")
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let client = InferenceClient::new(&InferenceConfig {
            address: format!("http://{addr}/"),
            timeout: Some(std::time::Duration::from_millis(200)),
            ..Default::default()
        })
        .unwrap();

        let started = std::time::Instant::now();
        let result = client
            .infer(&DecodedFrame::new("output_0001.png", vec![0]))
            .await;

        match result {
            Err(InferenceError::Request(err)) => assert!(err.is_timeout()),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let (addr, _uploads) = serve(|_| (StatusCode::OK, "hover"));
        let client = client_for(addr);

        let result = client
            .infer_file(Path::new("/nonexistent/output_0001.png"))
            .await;

        assert!(matches!(result, Err(InferenceError::Read { .. })));
    }

    #[test]
    fn invalid_address_is_rejected() {
        let result = InferenceClient::new(&InferenceConfig {
            address: "0.0.0.0:5000".to_owned(),
            ..Default::default()
        });

        assert!(result.is_err());
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(mime_type(Path::new("a/output_0001.PNG")), "image/png");
        assert_eq!(mime_type(Path::new("frame.jpeg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("frame")), "application/octet-stream");
    }
}

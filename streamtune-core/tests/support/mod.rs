//! Loopback HTTP server, a silent audio output and fixtures for integration tests

#![allow(dead_code)]

use std::{io::Cursor, net::SocketAddr};

use axum::{
    Router,
    http::{StatusCode, header},
    routing::get,
};
use hound::{WavSpec, WavWriter};
use streamtune_core::{engine::AudioOutput, error::StreamError, source::BufferedSource};
use tokio::runtime::Runtime;

/// Sample rate of generated fixtures
pub const FIXTURE_RATE: u32 = 8000;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status code"),
            content_type: "text/plain",
            body: format!("status {status}").into_bytes(),
        }
    }
}

/// Serves fixed responses by request path; unknown paths get a 404.
///
/// Runs on its own runtime so tests can block on theirs freely.
pub struct TestServer {
    addr: SocketAddr,
    _runtime: Runtime,
}

impl TestServer {
    pub fn start(routes: Vec<(&str, Route)>) -> Self {
        streamtune_core::init_logger();

        let router = routes.into_iter().fold(Router::new(), |router, (path, route)| {
            router.route(
                path,
                get(move || {
                    let route = route.clone();
                    async move { (route.status, [(header::CONTENT_TYPE, route.content_type)], route.body) }
                }),
            )
        });

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("server runtime");
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");

        runtime.spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                log::error!("Test server stopped: {}", e);
            }
        });

        Self {
            addr,
            _runtime: runtime,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Accepts every source and plays nothing; position only moves when a test moves it
#[derive(Debug, Default)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn start(&mut self, _: BufferedSource, _: f32, _: bool) -> Result<(), StreamError> {
        Ok(())
    }
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn stop(&mut self) {}
    fn set_volume(&mut self, _: f32) {}
}

/// Mono 16-bit WAV of a quiet sine wave
pub fn sine_wav(duration_ms: u64) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: FIXTURE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut bytes, spec).expect("wav header");
        let frames = (FIXTURE_RATE as u64 * duration_ms) / 1000;
        for i in 0..frames {
            let t = i as f32 / FIXTURE_RATE as f32;
            let value = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.25;
            writer
                .write_sample((value * i16::MAX as f32) as i16)
                .expect("wav sample");
        }
        writer.finalize().expect("wav finalize");
    }
    bytes.into_inner()
}

pub fn catalog_json() -> String {
    serde_json::json!([
        {"id": 1, "title": "A", "artist": "X"},
        {"id": 2, "title": "B", "artist": "Y"},
        {"id": 3, "title": "C", "artist": "Z"}
    ])
    .to_string()
}

use binlog::{log_record, Config, Logger, Statistics};
use binlog::clock::raw_ticks;
use binlog::self_text_segment;
use lz4::EncoderBuilder;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const BINARY_LOG: &str = "frames.bin.lz4";
const TEXT_LOG: &str = "plaintext.log";
const CHUNK_SIZE: usize = 4 * 1024 * 1024;
const ITERATIONS: usize = 200_000;

const PAYLOAD: &str = "status=degraded reason=\"upstream timeout\" retries=4 \
                       backlog=9312 peer=10.40.2.17:9301";

/// Hands completed chunks to a compressor thread and counts the raw frame
/// bytes as they pass through, so the wire volume is known without touching
/// the filesystem.
struct ChunkSender {
    sender: Sender<Vec<u8>>,
    raw_bytes: Arc<AtomicU64>,
}

impl ChunkSender {
    /// Joining the returned handle guarantees the lz4 stream is finished.
    fn spawn(path: &'static str) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = channel::<Vec<u8>>();
        let handle = thread::spawn(move || {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .unwrap();
            let mut encoder = EncoderBuilder::new().level(4).build(file).unwrap();
            while let Ok(chunk) = receiver.recv() {
                encoder.write_all(&chunk).unwrap();
            }
            encoder.finish().1.unwrap();
        });
        let writer = ChunkSender { sender, raw_bytes: Arc::new(AtomicU64::new(0)) };
        (writer, handle)
    }
}

impl Write for ChunkSender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.raw_bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        let _ = self.sender.send(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Per-run wall times in milliseconds.
#[derive(Default)]
struct Samples(Vec<f64>);

impl Samples {
    fn push(&mut self, millis: f64) {
        self.0.push(millis);
    }

    fn mean(&self) -> f64 {
        self.0.iter().sum::<f64>() / self.0.len() as f64
    }

    fn range(&self) -> (f64, f64) {
        self.0.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
    }

    fn nanos_per_record(&self) -> f64 {
        self.mean() * 1e6 / ITERATIONS as f64
    }

    fn million_records_per_sec(&self) -> f64 {
        ITERATIONS as f64 / self.mean() / 1e3
    }
}

fn remove_outputs() {
    let _ = fs::remove_file(BINARY_LOG);
    let _ = fs::remove_file(TEXT_LOG);
}

fn file_size(path: &str) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// One binary-logger run: millis, raw frame bytes, resolver counters.
fn run_binary() -> (f64, u64, Statistics) {
    let (chunks, compressor) = ChunkSender::spawn(BINARY_LOG);
    let raw_bytes = chunks.raw_bytes.clone();
    let (base, size) = self_text_segment();
    let mut logger = Logger::new(
        BufWriter::with_capacity(CHUNK_SIZE, chunks),
        Config::new(base, size).add_timestamp(true).timestamp_fn(raw_ticks),
    );

    let start = Instant::now();
    for i in 0..ITERATIONS {
        log_record!(logger, "worker %d event %s", i, PAYLOAD).unwrap();
    }
    let elapsed = start.elapsed();

    let stats = logger.statistics();
    assert_eq!(stats.l1_miss + stats.l2_miss, 1);
    drop(logger); // flush the tail chunk, close the channel
    compressor.join().unwrap();

    (
        elapsed.as_secs_f64() * 1000.0,
        raw_bytes.load(Ordering::Relaxed),
        stats,
    )
}

/// One formatted-text run through tracing, for comparison. Returns millis.
fn run_text() -> f64 {
    let appender = tracing_appender::rolling::never(".", TEXT_LOG);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(EnvFilter::default().add_directive(Level::INFO.into()))
        .finish();
    let scope = tracing::subscriber::set_default(subscriber);

    let start = Instant::now();
    for i in 0..ITERATIONS {
        info!(worker = i, event = PAYLOAD, "frame");
    }
    drop(scope);
    drop(guard); // block until the writer thread has drained
    start.elapsed().as_secs_f64() * 1000.0
}

fn main() {
    let runs = if std::env::var("SINGLE_ITERATION").is_ok() { 1 } else { 10 };
    let mut binary = Samples::default();
    let mut text = Samples::default();

    println!("\n{ITERATIONS} records per run, {runs} runs\n");

    for run in 1..=runs {
        remove_outputs();

        let (binary_ms, raw_bytes, stats) = run_binary();
        binary.push(binary_ms);
        let compressed_bytes = file_size(BINARY_LOG);

        let text_ms = run_text();
        text.push(text_ms);
        let text_bytes = file_size(TEXT_LOG);

        if run == 1 {
            println!(
                "cache: l1_hit={} l1_miss={} l2_used={}",
                stats.l1_hit, stats.l1_miss, stats.l2_used
            );
        }
        println!(
            "run {run}: binary {binary_ms:.1}ms ({raw} raw / {lz4} lz4 bytes), \
             text {text_ms:.1}ms ({text_bytes} bytes)",
            raw = raw_bytes,
            lz4 = compressed_bytes,
        );
    }

    let (binary_lo, binary_hi) = binary.range();
    let (text_lo, text_hi) = text.range();

    println!("\nbinary: mean {:.1}ms  range {:.1}..{:.1}ms", binary.mean(), binary_lo, binary_hi);
    println!(
        "        {:.0} ns/record, {:.2}M records/sec",
        binary.nanos_per_record(),
        binary.million_records_per_sec()
    );
    println!("text:   mean {:.1}ms  range {:.1}..{:.1}ms", text.mean(), text_lo, text_hi);
    println!("speedup: {:.1}x", text.mean() / binary.mean());

    remove_outputs();
}

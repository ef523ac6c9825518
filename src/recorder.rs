// ===============================
// src/recorder.rs
// ===============================
//
// JSONL recorder untuk event loop (tick outcome, error, pass):
// - Append satu Event per baris, BufWriter agar hemat syscall.
// - Flush periodik tiap 1s dan tiap 1000 event.
// - Parent directory dibuat otomatis.
// - Tulis gagal -> reopen sekali; kalau open gagal, recorder berhenti
//   (loop trading tetap jalan, sender pakai try_send).
//
// ENV: set `RECORD_FILE=/path/to/events.jsonl` agar aktif (lihat main.rs).
//
use std::path::Path;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{self, AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Event;

const FLUSH_EVERY_N_EVENTS: u32 = 1000;

async fn open_writer(path: &str) -> io::Result<BufWriter<File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(BufWriter::new(file))
}

async fn write_line(writer: &mut BufWriter<File>, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    let mut writer = match open_writer(&path).await {
        Ok(w) => w,
        Err(e) => {
            error!(?e, %path, "recorder: open failed, recording disabled");
            return;
        }
    };
    info!(%path, "recorder: started");

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_last_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                let Some(ev) = maybe_ev else {
                    let _ = writer.flush().await;
                    info!("recorder: channel closed, stopped");
                    break;
                };
                let line = match serde_json::to_string(&ev) {
                    Ok(s) => s,
                    Err(e) => {
                        error!(?e, "recorder: serialize error, skip event");
                        continue;
                    }
                };
                if let Err(e) = write_line(&mut writer, &line).await {
                    error!(?e, "recorder: write failed, attempting reopen");
                    writer = match open_writer(&path).await {
                        Ok(w) => w,
                        Err(e2) => {
                            error!(?e2, %path, "recorder: reopen failed, stopped");
                            return;
                        }
                    };
                    if let Err(e2) = write_line(&mut writer, &line).await {
                        error!(?e2, "recorder: write failed again after reopen, drop event");
                        continue;
                    }
                }
                since_last_flush += 1;
                if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                    let _ = writer.flush().await;
                    since_last_flush = 0;
                }
            }
            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}

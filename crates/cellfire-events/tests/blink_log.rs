//! Writes a blink log to disk through the channel sink and replays it.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_truncation)]

use std::io::BufReader;
use std::time::Duration;

use cellfire_events::log::create_blink_log;
use cellfire_events::{BlinkRecord, BlinkSink, ChannelSink, read_blink_log};
use cellfire_types::FireflyId;

#[tokio::test]
async fn log_written_by_the_writer_task_replays_across_a_minute() {
    let path = std::env::temp_dir().join(format!("cellfire-blinks-{}.csv", std::process::id()));

    let (sink, rx) = ChannelSink::new();
    let writer = {
        let path = path.clone();
        tokio::spawn(async move { create_blink_log(&path, rx, Duration::from_millis(10)).await })
    };

    // 58.9s, 59.95s, then 60.05s and 61.5s after the minute rolls over.
    let clocks = [58_900_000, 59_950_000, 60_050_000, 61_500_000];
    for (id, clock) in clocks.into_iter().enumerate() {
        sink.record(BlinkRecord::at(FireflyId::new(id as u32), clock));
    }
    drop(sink);

    let written = writer.await.unwrap().unwrap();
    assert_eq!(written, 4);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "0,58,900\n1,59,950\n2,0,50\n3,1,500\n");

    let file = std::fs::File::open(&path).unwrap();
    let times = read_blink_log(BufReader::new(file)).unwrap();
    let millis: Vec<u64> = times.iter().map(|t| t.millis).collect();
    assert_eq!(millis, vec![58_900, 59_950, 60_050, 61_500]);

    std::fs::remove_file(&path).unwrap();
}

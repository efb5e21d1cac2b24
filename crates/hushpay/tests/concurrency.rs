//! parallel operations through one service

use std::sync::Arc;
use std::thread;

use hushpay::wire::{OpenRequest, UpdateRequest};
use hushpay::{ChannelConfig, ChannelService, ParameterSet, Participant, PerParticipant};

fn service() -> Arc<ChannelService> {
    let config = ChannelConfig::default().with_parameter_set(ParameterSet::Modp768);
    Arc::new(ChannelService::new(config).with_seed(99))
}

fn open(service: &ChannelService, id: &str) {
    service
        .open(&OpenRequest {
            deposit_alice: 1_000,
            deposit_bob: 1_000,
            channel_id: Some(id.into()),
        })
        .unwrap();
}

#[test]
fn payments_on_one_channel_are_serialized() {
    let service = service();
    open(&service, "shared");

    let threads: Vec<_> = (0..4)
        .map(|i| {
            let service = service.clone();
            let payer = if i % 2 == 0 { Participant::Alice } else { Participant::Bob };
            thread::spawn(move || {
                for _ in 0..5 {
                    service
                        .update(&UpdateRequest {
                            delta: 3,
                            payer,
                            channel_id: Some("shared".into()),
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let channel = service.channel(Some("shared")).unwrap();
    assert_eq!(channel.sequence(), 20);
    // two alice threads and two bob threads, equal amounts each way
    assert_eq!(channel.balances(), PerParticipant::new(1_000, 1_000));

    let history = service.history(Some("shared")).unwrap().history;
    let sequences: Vec<u64> = history.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, (0..=20).collect::<Vec<_>>());

    let record = service.ledger().record(channel.id()).unwrap().unwrap();
    assert_eq!(record.sequence, 20);
    assert_eq!(&record.commitments, channel.commitments());
}

#[test]
fn independent_channels_progress_in_parallel() {
    let service = service();
    let ids: Vec<String> = (0..4).map(|i| format!("chan-{i}")).collect();
    for id in &ids {
        open(&service, id);
    }

    let threads: Vec<_> = ids
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, id)| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..=i {
                    service
                        .update(&UpdateRequest {
                            delta: 10,
                            payer: Participant::Alice,
                            channel_id: Some(id.clone()),
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    for (i, id) in ids.iter().enumerate() {
        let channel = service.channel(Some(id)).unwrap();
        let payments = i as u64 + 1;
        assert_eq!(channel.sequence(), payments);
        assert_eq!(channel.balances().alice, 1_000 - 10 * payments);
        assert_eq!(channel.balances().bob, 1_000 + 10 * payments);
    }
}

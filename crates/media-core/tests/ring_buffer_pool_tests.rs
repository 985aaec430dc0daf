// Ring buffer pool tests
//
// Covers the binding graph, the mixing primitive and format changes.

use std::sync::Arc;
use std::time::Duration;

use voipd_media_core::prelude::*;

const DEFAULT_ID: &str = RingBufferPool::DEFAULT_ID;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("voipd_media_core=debug")
        .try_init();
}

fn pool() -> RingBufferPool {
    init_tracing();
    RingBufferPool::new(AudioFormat::telephony())
}

fn frame(pool: &RingBufferPool, samples: Vec<Sample>, has_voice: bool) -> AudioFrame {
    AudioFrame::new(samples, pool.internal_audio_format(), has_voice)
}

#[test]
fn create_is_idempotent() {
    let pool = pool();
    let a = pool.create_ring_buffer("call-1");
    let b = pool.create_ring_buffer("call-1");
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn pool_never_extends_buffer_lifetime() {
    let pool = pool();
    {
        let _rb = pool.create_ring_buffer("ephemeral");
        assert!(pool.get_ring_buffer("ephemeral").is_some());
    }
    // Last owner gone; the weak cache entry must not resurrect it
    assert!(pool.get_ring_buffer("ephemeral").is_none());
}

#[test]
fn bind_then_unbind_leaves_zero_mutual_availability() {
    let pool = pool();
    let rb_a = pool.create_ring_buffer("a");
    let rb_b = pool.create_ring_buffer("b");

    pool.bind_ring_buffers("a", "b");
    rb_a.put(frame(&pool, vec![1], false)).unwrap();
    rb_b.put(frame(&pool, vec![2], false)).unwrap();
    assert!(pool.available_for_get("a") > 0);
    assert!(pool.available_for_get("b") > 0);

    pool.unbind_ring_buffers("a", "b");
    assert_eq!(pool.available_for_get("a"), 0);
    assert_eq!(pool.available_for_get("b"), 0);
    assert!(pool.bound_sources("a").is_empty());
    assert!(pool.bound_sources("b").is_empty());
}

#[test]
fn bind_is_idempotent() {
    let pool = pool();
    let _a = pool.create_ring_buffer("a");
    let _b = pool.create_ring_buffer("b");

    pool.bind_ring_buffers("a", "b");
    let once = pool.bound_sources("a");
    pool.bind_ring_buffers("a", "b");
    assert_eq!(pool.bound_sources("a"), once);
    assert_eq!(pool.bound_sources("a"), vec!["b".to_string()]);
}

#[test]
fn bind_unknown_id_leaves_graph_untouched() {
    let pool = pool();
    let _a = pool.create_ring_buffer("a");
    pool.bind_ring_buffers("a", "nonexistent");
    assert!(pool.bound_sources("a").is_empty());
    assert!(pool.bound_sources("nonexistent").is_empty());
}

#[test]
fn single_source_pass_through_is_bit_exact() {
    let pool = pool();
    let _rb = pool.create_ring_buffer("testid");

    pool.bind_ring_buffers("testid", DEFAULT_ID);
    pool.default_ring_buffer()
        .put(frame(&pool, vec![12], false)).unwrap();

    let out = pool.get_data("testid").expect("one frame pending");
    assert_eq!(out.samples, vec![12]);
    assert!(!out.has_voice);
    // Nothing left afterwards
    assert!(pool.get_data("testid").is_none());
}

#[test]
fn single_source_pass_through_is_zero_copy() {
    let pool = pool();
    let rb_src = pool.create_ring_buffer("src");
    let _rb_dst = pool.create_ring_buffer("dst");

    pool.bind_ring_buffers("dst", "src");

    // A second reader registered before the put sees the same allocation
    rb_src.create_read_offset("probe");
    rb_src.put(frame(&pool, vec![7, 8, 9], true)).unwrap();

    let via_pool = pool.get_data("dst").unwrap();
    let direct = rb_src.get("probe").unwrap();
    assert!(Arc::ptr_eq(&via_pool, &direct));
    assert_eq!(via_pool.samples, vec![7, 8, 9]);
}

#[test]
fn two_sources_mix_additively_and_or_voice() {
    let pool = pool();
    let rb1 = pool.create_ring_buffer("src-1");
    let rb2 = pool.create_ring_buffer("src-2");
    let _rb = pool.create_ring_buffer("mixer");

    pool.bind_half_duplex_out("mixer", "src-1");
    pool.bind_half_duplex_out("mixer", "src-2");

    rb1.put(frame(&pool, vec![100, 200], true)).unwrap();
    rb2.put(frame(&pool, vec![-30, 50], false)).unwrap();

    let mixed = pool.get_data("mixer").expect("mix available");
    assert_eq!(mixed.samples, vec![70, 250]);
    assert!(mixed.has_voice);
    assert_eq!(mixed.format, pool.internal_audio_format());
}

#[test]
fn mix_skips_source_with_no_data() {
    let pool = pool();
    let rb1 = pool.create_ring_buffer("src-1");
    let _rb2 = pool.create_ring_buffer("src-2");
    let _rb = pool.create_ring_buffer("mixer");

    pool.bind_half_duplex_out("mixer", "src-1");
    pool.bind_half_duplex_out("mixer", "src-2");

    // Only src-1 produced anything; the empty source must not block the mix
    rb1.put(frame(&pool, vec![42], false)).unwrap();
    let mixed = pool.get_data("mixer").expect("mix available");
    assert_eq!(mixed.samples, vec![42]);
}

#[test]
fn available_is_zero_without_bound_sources() {
    let pool = pool();
    let rb_other = pool.create_ring_buffer("other");
    let _rb_a = pool.create_ring_buffer("a");

    // Unrelated traffic must not count for "a"
    rb_other.put(frame(&pool, vec![1, 2, 3], false)).unwrap();
    assert_eq!(pool.available_for_get("a"), 0);
    assert!(pool.get_data("a").is_none());
    assert!(pool.get_available_data("a").is_none());
}

#[test]
fn available_is_min_over_active_sources() {
    let pool = pool();
    let rb1 = pool.create_ring_buffer("src-1");
    let rb2 = pool.create_ring_buffer("src-2");
    let rb3 = pool.create_ring_buffer("src-3");
    let _rb = pool.create_ring_buffer("mixer");

    pool.bind_half_duplex_out("mixer", "src-1");
    pool.bind_half_duplex_out("mixer", "src-2");
    pool.bind_half_duplex_out("mixer", "src-3");

    rb1.put(frame(&pool, vec![0; 160], false)).unwrap();
    rb1.put(frame(&pool, vec![0; 160], false)).unwrap();
    rb2.put(frame(&pool, vec![0; 160], false)).unwrap();
    // src-3 reports zero and is excluded from the minimum
    let _ = rb3;

    assert_eq!(pool.available_for_get("mixer"), 160);
}

#[test]
fn unbind_all_tears_down_graph_symmetrically() {
    let pool = pool();
    let rb_a = pool.create_ring_buffer("a");
    let _rb_b = pool.create_ring_buffer("b");
    let _rb_c = pool.create_ring_buffer("c");

    pool.bind_ring_buffers("a", "b");
    pool.bind_ring_buffers("a", "c");
    pool.bind_half_duplex_out("listener", "a");

    pool.unbind_all("a");

    assert!(pool.bound_sources("a").is_empty());
    assert!(pool.bound_sources("b").is_empty());
    assert!(pool.bound_sources("c").is_empty());
    assert!(pool.bound_sources("listener").is_empty());

    // Former peers can no longer read anything from "a"
    rb_a.put(frame(&pool, vec![1], false)).unwrap();
    assert_eq!(pool.available_for_get("b"), 0);
    assert_eq!(pool.available_for_get("c"), 0);
    assert_eq!(pool.available_for_get("listener"), 0);
}

#[test]
fn half_duplex_listener_is_not_a_source() {
    let pool = pool();
    let rb_conf = pool.create_ring_buffer("conf");
    let _listener = pool.create_ring_buffer("listener");

    pool.bind_half_duplex_out("listener", "conf");
    rb_conf.put(frame(&pool, vec![5], false)).unwrap();

    assert_eq!(pool.get_data("listener").unwrap().samples, vec![5]);
    // The conference never reads the listener back
    assert!(pool.bound_sources("conf").is_empty());
    assert_eq!(pool.available_for_get("conf"), 0);
}

#[test]
fn flush_drops_backlog_for_reader() {
    let pool = pool();
    let rb_src = pool.create_ring_buffer("src");
    let _rb_dst = pool.create_ring_buffer("dst");

    pool.bind_ring_buffers("dst", "src");
    rb_src.put(frame(&pool, vec![1], false)).unwrap();
    rb_src.put(frame(&pool, vec![2], false)).unwrap();

    pool.flush("dst");
    assert_eq!(pool.available_for_get("dst"), 0);

    rb_src.put(frame(&pool, vec![3], false)).unwrap();
    assert_eq!(pool.get_data("dst").unwrap().samples, vec![3]);
}

#[test]
fn producer_in_stale_format_is_rejected_after_change() {
    let pool = pool();
    let rb_src = pool.create_ring_buffer("src");
    let _rb_dst = pool.create_ring_buffer("dst");
    pool.bind_ring_buffers("dst", "src");

    let narrowband = pool.internal_audio_format();
    pool.set_internal_audio_format(AudioFormat::mono_16bit(SampleRate::Rate16000));

    // A producer still emitting the old format must not slip frames past
    // the format change
    let err = rb_src
        .put(AudioFrame::new(vec![1], narrowband, false))
        .unwrap_err();
    assert!(matches!(err, Error::FormatMismatch { .. }));
    assert_eq!(pool.available_for_get("dst"), 0);
}

#[test]
fn format_change_clears_all_backlog() {
    let pool = pool();
    let rb_src = pool.create_ring_buffer("src");
    let _rb_dst = pool.create_ring_buffer("dst");

    pool.bind_ring_buffers("dst", "src");
    rb_src.put(frame(&pool, vec![1, 2, 3], false)).unwrap();
    assert!(pool.available_for_get("dst") > 0);

    let wideband = AudioFormat::mono_16bit(SampleRate::Rate16000);
    pool.set_internal_audio_format(wideband);

    assert_eq!(pool.available_for_get("dst"), 0);
    assert_eq!(pool.internal_audio_format(), wideband);
    assert_eq!(rb_src.format(), wideband);
}

#[test]
fn format_change_to_same_format_keeps_backlog() {
    let pool = pool();
    let rb_src = pool.create_ring_buffer("src");
    let _rb_dst = pool.create_ring_buffer("dst");

    pool.bind_ring_buffers("dst", "src");
    rb_src.put(frame(&pool, vec![1], false)).unwrap();

    pool.set_internal_audio_format(pool.internal_audio_format());
    assert_eq!(pool.available_for_get("dst"), 1);
}

#[test]
fn discard_forwards_to_every_source() {
    let pool = pool();
    let rb1 = pool.create_ring_buffer("src-1");
    let rb2 = pool.create_ring_buffer("src-2");
    let _rb = pool.create_ring_buffer("mixer");

    pool.bind_half_duplex_out("mixer", "src-1");
    pool.bind_half_duplex_out("mixer", "src-2");

    rb1.put(frame(&pool, vec![1, 2], false)).unwrap();
    rb2.put(frame(&pool, vec![3, 4], false)).unwrap();

    assert_eq!(pool.discard(2, "mixer"), 2);
    assert_eq!(pool.available_for_get("mixer"), 0);
}

#[test]
fn wait_for_data_times_out_and_succeeds() {
    let pool = pool();
    let rb_src = pool.create_ring_buffer("src");
    let _rb_dst = pool.create_ring_buffer("dst");
    pool.bind_ring_buffers("dst", "src");

    assert!(!pool.wait_for_data_available("dst", 1, Duration::from_millis(20)));

    rb_src.put(frame(&pool, vec![1, 2], false)).unwrap();
    assert!(pool.wait_for_data_available("dst", 2, Duration::from_millis(20)));
}

#[test]
fn wait_for_data_without_bindings_returns_false() {
    let pool = pool();
    let _rb = pool.create_ring_buffer("loner");
    assert!(!pool.wait_for_data_available("loner", 1, Duration::from_millis(5)));
}

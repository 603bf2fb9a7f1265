//! Kernels on a compute device agree with the host.
//!
//! Every test is skipped when no adapter with compute support is available.
#[path = "util.rs"]
mod util;

use pixel_bridge::{kernel_fn, Bridge, HostBitmap, Identity, Kernel, Luma, Mono, TransformError};

use self::util::{checksum, device_bridge, init_logging, pattern};

fn compare_with_host(bridge: &Bridge, kernel: &dyn Kernel, width: u32, height: u32) {
    let input = HostBitmap::from_pixels(width, height, &pattern(width, height, width ^ height));
    let mut on_device = HostBitmap::new(width, height);
    let mut on_host = HostBitmap::new(width, height);

    bridge
        .transform(width as i32, height as i32, &input, &on_device, kernel)
        .expect("device transform");
    Bridge::host()
        .transform(width as i32, height as i32, &input, &on_host, kernel)
        .expect("host transform");

    assert_eq!(
        checksum(&mut on_device),
        checksum(&mut on_host),
        "{} differs on {}x{}",
        kernel.name(),
        width,
        height,
    );
}

#[test]
fn mono_example() {
    init_logging();
    let bridge = match device_bridge() {
        Some(bridge) => bridge,
        None => return,
    };

    let input = HostBitmap::from_pixels(2, 1, &[[255, 0, 0, 255], [0, 255, 0, 255]]);
    let mut output = HostBitmap::new(2, 1);

    bridge.transform_mono(2, 1, &input, &output).expect("device transform");
    assert_eq!(output.pixels(), vec![[85, 85, 85, 255], [85, 85, 85, 255]]);
}

#[test]
fn agrees_with_host() {
    init_logging();
    let bridge = match device_bridge() {
        Some(bridge) => bridge,
        None => return,
    };

    // Sizes that do and do not fill whole workgroups.
    for &(width, height) in &[(1, 1), (8, 8), (13, 7), (64, 3), (3, 65)] {
        compare_with_host(&bridge, &Mono, width, height);
        compare_with_host(&bridge, &Luma, width, height);
        compare_with_host(&bridge, &Identity, width, height);
    }
}

#[test]
fn host_only_kernel() {
    init_logging();
    let bridge = match device_bridge() {
        Some(bridge) => bridge,
        None => return,
    };

    let invert = kernel_fn("invert", |[r, g, b, a]| [!r, !g, !b, a]);
    let input = HostBitmap::new(2, 2);
    let mut output = HostBitmap::from_pixels(2, 2, &[[1, 2, 3, 4]; 4]);

    let result = bridge.transform(2, 2, &input, &output, &invert);
    assert!(matches!(result, Err(TransformError::ComputeContextFailure(_))));

    assert_eq!(output.pixels(), vec![[1, 2, 3, 4]; 4]);
    assert!(!input.is_locked());
    assert!(!output.is_locked());
}

#[test]
fn concurrent_calls() {
    init_logging();
    let bridge = match device_bridge() {
        Some(bridge) => bridge,
        None => return,
    };

    let sizes = [(17u32, 5u32), (8, 8), (31, 2), (1, 40)];

    let concurrent: Vec<Vec<[u8; 4]>> = std::thread::scope(|scope| {
        let handles: Vec<_> = sizes
            .iter()
            .map(|&(w, h)| {
                let bridge = &bridge;
                scope.spawn(move || {
                    let input = HostBitmap::from_pixels(w, h, &pattern(w, h, w + h));
                    let mut output = HostBitmap::new(w, h);
                    for _ in 0..5 {
                        bridge.transform_mono(w as i32, h as i32, &input, &output).unwrap();
                    }
                    output.pixels()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("transform thread panicked"))
            .collect()
    });

    for (result, &(w, h)) in concurrent.iter().zip(&sizes) {
        let input = HostBitmap::from_pixels(w, h, &pattern(w, h, w + h));
        let mut sequential = HostBitmap::new(w, h);
        bridge.transform_mono(w as i32, h as i32, &input, &sequential).unwrap();
        assert_eq!(*result, sequential.pixels());
    }
}

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll};

pub(crate) mod ping_future;

/// Block on an async future that may depend on a device being polled.
///
/// With a device, each round waits for all submitted work before polling the future again so
/// that mapping callbacks have fired. Without one, the thread parks until woken.
pub(crate) fn block_on<F: Future>(future: F, device: Option<&wgpu::Device>) -> F::Output {
    let mut future = pin!(future);

    let thread = std::thread::current();
    let waker = waker_fn::waker_fn(move || thread.unpark());
    let mut ctx = Context::from_waker(&waker);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut ctx) {
            return output;
        }

        match device {
            Some(device) => {
                device.poll(wgpu::Maintain::Wait);
            }
            None => std::thread::park(),
        }
    }
}

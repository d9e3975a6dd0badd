/// Unit tests driving the bridge through a simulated extension client
mod common;
mod dispatch_tests;

//! Records a short session with a leak and a double release, then prints the report.

use alloc_audit::Registry;

fn main() {
    let registry = Registry::system();

    let _never_freed = registry.allocate::<i32>(2);
    let resized = registry.allocate::<i32>(4);

    // SAFETY: `resized` was just allocated by this registry and is still live.
    let resized = unsafe { registry.resize(resized, 3) };

    let _leaked = registry.zero_allocate::<u8>(10);

    registry
        .release(resized)
        .expect("first release of a live allocation succeeds");

    if let Err(e) = registry.release(resized) {
        println!("Caught: {e}\n");
    }

    registry.print_to_stdout();

    // Releases everything that leaked.
    registry.reset();
}

//! Relay Example - Watching all bus traffic with a wildcard subscription
//!
//! A relay subscribes to every event name and every target at once, the
//! way an out-of-process display shim would forward traffic. This example
//! prints the live transcript of a session and shows where the relay sits
//! in the fixed dispatch order.
//!
//! Run with: cargo run --example relay

use vetrina::{App, EventBus, Features, NameFilter, TargetFilter, styles};

fn main() -> vetrina::Result<()> {
    let bus = EventBus::new();

    println!("=== vetrina Relay Example ===\n");

    // The relay sees everything, in dispatch order.
    bus.subscribe(NameFilter::Any, TargetFilter::Any, |ev| {
        println!("  [relay] {:<11} -> {:?}", ev.name.to_string(), ev.target);
    });

    let app = App::new(&bus, Features::empty())?;

    println!("\nBuilding a stack with two buttons:");
    let stack = app.stack(styles! {}, |app| {
        app.button("first", styles! {})?;
        app.button("second", styles! {})?;
        Ok(())
    })?;

    println!("\nOne targeted click (name-specific listeners run before the relay):");
    let first = stack.children()[0].clone();
    first.on_click(|| println!("  [binding] first button clicked"))?;
    bus.dispatch(&vetrina::Event::click(first.id()))?;

    println!("\nTearing the stack down (children announce before parents):");
    stack.destroy()?;

    println!("\n=== Example Complete ===");
    Ok(())
}

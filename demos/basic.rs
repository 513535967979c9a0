//! Basic Example - A headless session with a mirrored display tree
//!
//! This example demonstrates the core loop of vetrina:
//! - Building a small UI with slots, buttons and an edit line
//! - Attaching a display service that mirrors the tree from events
//! - Injecting display-side events and watching them flow back
//!
//! Run with: cargo run --example basic

use vetrina::display::{DisplayService, RecordingSink};
use vetrina::{App, EventBus, Features, styles};

fn main() -> vetrina::Result<()> {
    let bus = EventBus::new();
    let sink = RecordingSink::new();
    let service = DisplayService::attach(&bus, sink.clone());
    let app = App::new(&bus, Features::empty())?;

    println!("=== vetrina Basic Example ===\n");

    // A greeting, a text field, and a button that reacts to clicks.
    let mut edit = None;
    let mut button = None;
    app.stack(styles! { "margin" => 8 }, |app| {
        app.para("What is your name?", styles! { "size" => 16 })?;
        edit = Some(app.edit_line("", styles! { "width" => 200 })?);
        button = Some(app.button("Greet", styles! {})?);
        Ok(())
    })?;
    let edit = edit.unwrap();
    let button = button.unwrap();

    let greeting = app.para("...", styles! {})?;
    let edit_handle = edit.clone();
    let greeting_handle = greeting.clone();
    button.on_click(move || {
        let name = edit_handle
            .style("text")
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        let _ = greeting_handle.set_style("text", format!("Hello, {name}!"));
    })?;

    println!("Logical tree after construction:");
    print_tree(&app.root(), 1);

    println!("\nDisplay mirrors: {}", service.mirror_count());
    println!("Sink operations so far: {}", sink.len());

    // The display side reports typing, then a click.
    service.change(edit.id(), "Ada")?;
    service.click(button.id())?;

    println!("\nAfter typing and clicking:");
    println!("  edit line text:  {:?}", edit.style("text"));
    println!("  greeting text:   {:?}", greeting.style("text"));
    let mirror = service.drawable(greeting.id())?;
    println!("  mirrored text:   {:?}", mirror.style("text"));

    println!("\nLast sink operations:");
    for op in sink.ops().iter().rev().take(3).rev() {
        println!("  {op:?}");
    }

    println!("\n=== Example Complete ===");
    Ok(())
}

fn print_tree(drawable: &vetrina::Drawable, depth: usize) {
    println!(
        "{:indent$}{} #{}",
        "",
        drawable.kind_name(),
        drawable.id(),
        indent = depth * 2
    );
    for child in drawable.children() {
        print_tree(&child, depth + 1);
    }
}

use std::cell::Cell;
use std::rc::Rc;

use dom_event_tracker::{
    CallArgs, EventTracker, Framework, Function, LogPhase, Page, Result, SelectedEventTypes,
    SourceLocation, Value,
};

const PAGE: &str = r#"<div id="x"><button id="open">open</button></div>
<div id="m" class="modal fade"></div>
<div id="out" class="event-tracker-output"></div>"#;

fn library(function: &str, calls: &Rc<Cell<usize>>) -> Function {
    let sink = Rc::clone(calls);
    Function::new(
        SourceLocation::new(function, "https://cdn.page.test/lib.min.js", 1, 900),
        move |_: &mut Page, _: &CallArgs| {
            sink.set(sink.get() + 1);
            Ok(Value::Undefined)
        },
    )
}

fn start(page: &mut Page) -> Result<EventTracker> {
    let root = page.select("#x")?;
    let tracker = EventTracker::new(page.select("#out")?)?;
    tracker.set_selected_event_types(page, SelectedEventTypes::only(["click"]));
    tracker.start_tracking(page, root);
    Ok(tracker)
}

fn messages(tracker: &EventTracker, phase: LogPhase) -> Vec<String> {
    tracker
        .entries_with_phase(phase)
        .into_iter()
        .map(|entry| entry.message)
        .collect()
}

#[test]
fn sweetalert_entry_points_are_wrapped_and_restored() -> Result<()> {
    let mut page = Page::from_html(PAGE)?;
    let calls = Rc::new(Cell::new(0));
    let swal = library("Swal", &calls);
    let fire = library("fire", &calls);
    page.set_global("Swal", swal.clone());
    page.set_global("Swal.fire", fire.clone());

    let tracker = start(&mut page)?;
    assert_eq!(
        tracker.detected_frameworks(),
        vec![Framework::Bootstrap, Framework::SweetAlert2]
    );
    let info = messages(&tracker, LogPhase::Info);
    assert!(info.contains(&"Detected UI frameworks: Bootstrap, SweetAlert2".to_string()));
    assert!(info.contains(&"SweetAlert2 popup monitoring added".to_string()));
    assert!(
        !matches!(page.global("Swal.fire"), Some(Value::Function(current)) if current.ptr_eq(&fire))
    );

    page.run_script(
        SourceLocation::new("confirmSave", "https://page.test/app.js", 70, 9),
        |page| page.call_global("Swal.fire", CallArgs::new(vec![Value::from("Saved")])),
    )
    .map_err(|err| dom_event_tracker::Error::Config(err.to_string()))?;
    assert_eq!(calls.get(), 1);
    let popup = &tracker.entries_with_phase(LogPhase::Popup)[0];
    assert_eq!(popup.message, "Swal.fire called: Saved");
    let frame = popup
        .stack
        .as_ref()
        .and_then(|stack| stack.frames.first())
        .and_then(|frame| frame.source.clone());
    assert_eq!(frame.map(|source| source.line), Some(70));

    tracker.stop_tracking(&mut page);
    assert!(matches!(page.global("Swal"), Some(Value::Function(current)) if current.ptr_eq(&swal)));
    assert!(
        matches!(page.global("Swal.fire"), Some(Value::Function(current)) if current.ptr_eq(&fire))
    );
    assert!(tracker.detected_frameworks().is_empty());
    Ok(())
}

#[test]
fn jquery_modal_calls_name_the_receiver() -> Result<()> {
    let mut page = Page::from_html(PAGE)?;
    let calls = Rc::new(Cell::new(0));
    page.set_global("jQuery", Value::Object);
    page.set_global("jQuery.fn.modal", library("modal", &calls));

    let tracker = start(&mut page)?;
    let modal = page.select("#m")?;
    page.call_global("jQuery.fn.modal", CallArgs::with_this(modal, vec![Value::from("show")]))
        .map_err(|err| dom_event_tracker::Error::Config(err.to_string()))?;
    page.call_global("jQuery.fn.modal", CallArgs::new(Vec::new()))
        .map_err(|err| dom_event_tracker::Error::Config(err.to_string()))?;

    assert_eq!(calls.get(), 2);
    assert_eq!(
        messages(&tracker, LogPhase::Popup),
        vec![
            "jQuery modal call: show on div#m.modal.fade".to_string(),
            "jQuery modal call: toggle on unknown".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn bootstrap_modal_events_are_reported() -> Result<()> {
    let mut page = Page::from_html(PAGE)?;
    let tracker = start(&mut page)?;
    assert!(messages(&tracker, LogPhase::Info).contains(&"Bootstrap popup monitoring added".to_string()));

    let modal = page.select("#m")?;
    page.dispatch_event(modal, "show.bs.modal")?;
    let button = page.select("#open")?;
    page.dispatch_event(button, "shown.bs.modal")?;
    assert_eq!(
        messages(&tracker, LogPhase::Popup),
        vec!["Bootstrap modal show.bs.modal: div#m.modal.fade".to_string()]
    );

    tracker.stop_tracking(&mut page);
    let document = page.document();
    assert_eq!(page.listener_count(document, "show.bs.modal"), 0);
    Ok(())
}

#[test]
fn plain_pages_get_no_framework_monitoring() -> Result<()> {
    let mut page = Page::from_html(
        "<div id='x'></div><div id='out' class='event-tracker-output'></div>",
    )?;
    let tracker = start(&mut page)?;
    assert!(tracker.detected_frameworks().is_empty());
    assert!(
        messages(&tracker, LogPhase::Info)
            .iter()
            .all(|message| !message.contains("framework") && !message.contains("monitoring"))
    );
    Ok(())
}

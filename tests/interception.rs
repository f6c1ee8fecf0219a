use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dom_event_tracker::{
    Event, EventTarget, EventTracker, Handler, ListenerOptions, LogPhase, NodeId, Page, Result,
    SelectedEventTypes, SourceLocation, SourceOrigin, TrackerConfig, Value,
};

const PAGE: &str = r##"
<div id="outside">
  <div id="x">
    <button id="b" class="primary">go</button>
    <a id="anchor" href="#sec">jump</a>
    <a id="mail" href="mailto:team@page.test">mail us</a>
    <form id="f" action="/save" method="post">
      <input name="title"><textarea name="body"></textarea><input type="file" name="doc">
    </form>
  </div>
</div>
<div id="out" class="event-tracker-output"></div>
"##;

struct Fixture {
    page: Page,
    tracker: EventTracker,
    root: NodeId,
    button: NodeId,
}

fn fixture_with(config: TrackerConfig, types: &[&str]) -> Result<Fixture> {
    let page = Page::from_html(PAGE)?;
    let root = page.select("#x")?;
    let button = page.select("#b")?;
    let output = page.select("#out")?;
    let tracker = EventTracker::with_config(output, config)?;
    let mut fixture = Fixture {
        page,
        tracker,
        root,
        button,
    };
    fixture.tracker.set_selected_event_types(
        &mut fixture.page,
        SelectedEventTypes::only(types.iter().copied()),
    );
    Ok(fixture)
}

fn fixture(types: &[&str]) -> Result<Fixture> {
    fixture_with(TrackerConfig::default(), types)
}

fn app(function: &str, line: u32) -> SourceLocation {
    SourceLocation::new(function, "https://page.test/app.js", line, 5)
}

fn counter(function: &str) -> (Rc<Cell<usize>>, Handler) {
    let hits = Rc::new(Cell::new(0));
    let sink = Rc::clone(&hits);
    let handler = Handler::new(app(function, 1), move |_: &mut Page, _: &mut Event| {
        sink.set(sink.get() + 1);
        Ok(())
    });
    (hits, handler)
}

fn messages(tracker: &EventTracker, phase: LogPhase) -> Vec<String> {
    tracker
        .entries_with_phase(phase)
        .into_iter()
        .map(|entry| entry.message)
        .collect()
}

#[test]
fn in_scope_click_is_logged_in_both_phases_and_kept_from_the_page() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    let body = page.select("body")?;
    let (body_hits, on_body) = counter("onBody");
    let (root_hits, on_root) = counter("onRoot");
    page.add_event_listener(body, "click", &on_body, ListenerOptions::bubble());
    page.add_event_listener(root, "click", &on_root, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.click(button)?;

    assert_eq!(
        messages(&tracker, LogPhase::Capture),
        vec!["click (capture phase) on button#b.primary".to_string()]
    );
    assert_eq!(
        messages(&tracker, LogPhase::Bubble),
        vec!["click (bubble phase) on button#b.primary".to_string()]
    );
    assert_eq!(root_hits.get(), 1);
    assert_eq!(body_hits.get(), 0);
    assert_eq!(page.query_selector_all("#out .event-log")?.len(), 2);

    // Outside the tracked subtree the page keeps its own behavior.
    let outside = page.select("#outside")?;
    page.click(outside)?;
    assert_eq!(body_hits.get(), 1);
    assert_eq!(tracker.entries_with_phase(LogPhase::Capture).len(), 1);
    Ok(())
}

#[test]
fn stack_points_at_the_page_script_that_triggered_the_event() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    tracker.start_tracking(&mut page, root);
    page.run_script(app("clickIt", 12), |page| page.click(button))?;

    let entry = &tracker.entries_with_phase(LogPhase::Capture)[0];
    let stack = entry.stack.as_ref().ok_or(dom_event_tracker::Error::Config(
        "capture entry without stack".into(),
    ))?;
    assert!(stack.frames.iter().all(|frame| !frame.raw.contains("EventTracker.")));
    let source = stack.frames[0].source.clone();
    assert_eq!(source.map(|source| (source.line, source.column)), Some((12, 5)));
    Ok(())
}

#[test]
fn unselected_types_pass_through_unlogged() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    let body = page.select("body")?;
    let (body_hits, on_body) = counter("onBody");
    page.add_event_listener(body, "dblclick", &on_body, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.dispatch_event(button, "dblclick")?;
    page.dispatch_event(button, "keydown")?;

    assert_eq!(body_hits.get(), 1);
    assert!(
        tracker
            .entries()
            .iter()
            .all(|entry| entry.event_type.as_deref() != Some("dblclick")
                && entry.event_type.as_deref() != Some("keydown"))
    );
    assert!(tracker.entries_with_phase(LogPhase::Capture).is_empty());
    Ok(())
}

#[test]
fn restart_and_stop_leave_the_page_as_it_was() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click", "hashchange"])?;
    let native = page.entry_points();

    tracker.start_tracking(&mut page, root);
    assert!(tracker.is_tracking());
    assert!(!page.entry_points().same_as(&native));
    let patched = page.entry_points();
    let document = page.document();
    let listeners = page.listener_count(document, "click");

    tracker.start_tracking(&mut page, root);
    assert!(page.entry_points().same_as(&patched));
    assert_eq!(page.listener_count(document, "click"), listeners);

    tracker.stop_tracking(&mut page);
    assert!(!tracker.is_tracking());
    assert!(page.entry_points().same_as(&native));
    assert_eq!(page.listener_count(document, "click"), 0);
    assert_eq!(page.listener_count(EventTarget::Window, "hashchange"), 0);

    let logged = tracker.entries().len();
    page.click(button)?;
    assert_eq!(tracker.entries().len(), logged);
    assert!(
        messages(&tracker, LogPhase::Info)
            .iter()
            .any(|message| message == "Restored global listener methods")
    );
    Ok(())
}

#[test]
fn listener_registrations_are_logged_once_per_handler() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    tracker.start_tracking(&mut page, root);

    let (_, on_save) = counter("onSave");
    page.run_script(app("init", 20), |page| {
        page.add_event_listener(button, "click", &on_save, ListenerOptions::bubble());
        page.add_event_listener(button, "click", &on_save, ListenerOptions::bubble());
    });
    let outside = page.select("#outside")?;
    page.add_event_listener(outside, "click", &on_save, ListenerOptions::bubble());
    page.add_event_listener(button, "keydown", &on_save, ListenerOptions::bubble());

    let added: Vec<_> = tracker
        .entries()
        .into_iter()
        .filter(|entry| entry.message.starts_with("Listener added"))
        .collect();
    assert_eq!(added.len(), 1);
    assert_eq!(
        added[0].message,
        r#"Listener added: click on button#b.primary {"capture":false,"once":false,"passive":false}"#
    );
    let frame = added[0].stack.as_ref().and_then(|stack| stack.frames[0].source.clone());
    assert_eq!(frame.map(|source| source.line), Some(20));
    assert!(page.has_listener(button, "click", &on_save, false));

    page.remove_event_listener(button, "click", &on_save, ListenerOptions::bubble());
    assert!(!page.has_listener(button, "click", &on_save, false));
    let removed: Vec<_> = messages(&tracker, LogPhase::Info)
        .into_iter()
        .filter(|message| message.starts_with("Listener removed"))
        .collect();
    assert_eq!(
        removed,
        vec![r#"Listener removed: click from button#b.primary {"capture":false}"#.to_string()]
    );
    Ok(())
}

#[test]
fn inline_handler_assigned_during_a_session_is_reported_and_restored() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    tracker.start_tracking(&mut page, root);

    let calls = Rc::new(Cell::new(0));
    let sink = Rc::clone(&calls);
    let inline = Handler::new(app("inlineSave", 30), move |_: &mut Page, event: &mut Event| {
        sink.set(sink.get() + 1);
        event.prevent_default();
        Ok(())
    });
    page.set_property(button, "onclick", Value::Handler(inline.clone()))?;
    assert_eq!(
        page.get_property(button, "onclick")?,
        Value::Handler(inline.clone())
    );
    assert!(
        messages(&tracker, LogPhase::Info)
            .contains(&"onclick was set on button#b.primary".to_string())
    );

    let outcome = page.click(button)?;
    assert!(outcome.default_prevented);
    assert_eq!(calls.get(), 1);
    assert_eq!(
        messages(&tracker, LogPhase::Inline),
        vec!["Inline handler onclick fired on button#b.primary".to_string()]
    );
    assert!(
        messages(&tracker, LogPhase::Info)
            .contains(&"onclick prevented the default action".to_string())
    );

    tracker.stop_tracking(&mut page);
    assert!(page.own_property(button, "onclick").is_none());
    assert_eq!(page.get_property(button, "onclick")?, Value::Handler(inline));
    let logged = tracker.entries().len();
    page.click(button)?;
    assert_eq!(calls.get(), 2);
    assert_eq!(tracker.entries().len(), logged);
    Ok(())
}

#[test]
fn existing_inline_handlers_are_wrapped_at_start() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    let (calls, inline) = counter("legacyClick");
    page.set_property(button, "onclick", Value::Handler(inline.clone()))?;

    tracker.start_tracking(&mut page, root);
    assert!(page.own_property(button, "onclick").is_some());
    assert!(
        messages(&tracker, LogPhase::Info)
            .contains(&"Wrapped 1 existing inline handlers".to_string())
    );
    page.click(button)?;
    assert_eq!(calls.get(), 1);
    assert_eq!(tracker.entries_with_phase(LogPhase::Inline).len(), 1);

    tracker.stop_tracking(&mut page);
    assert_eq!(page.get_property(button, "onclick")?, Value::Handler(inline));
    Ok(())
}

#[test]
fn propagation_reaches_the_page_when_isolation_is_off() -> Result<()> {
    let config = TrackerConfig {
        isolate_propagation: false,
        ..TrackerConfig::default()
    };
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture_with(config, &["click"])?;
    let body = page.select("body")?;
    let (body_hits, on_body) = counter("onBody");
    page.add_event_listener(body, "click", &on_body, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.click(button)?;
    assert_eq!(body_hits.get(), 1);
    assert_eq!(tracker.entries_with_phase(LogPhase::Capture).len(), 1);
    assert_eq!(tracker.entries_with_phase(LogPhase::Bubble).len(), 1);
    Ok(())
}

#[test]
fn window_navigation_is_logged_without_isolation() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        ..
    } = fixture(&["hashchange"])?;
    let (window_hits, on_hash) = counter("onHash");
    page.add_event_listener(EventTarget::Window, "hashchange", &on_hash, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.set_hash("#a")?;
    page.pop_state(true)?;
    page.hide(true)?;

    assert_eq!(window_hits.get(), 1);
    assert_eq!(
        messages(&tracker, LogPhase::Navigation),
        vec![
            "Navigation event: hashchange (from (none) to #a)".to_string(),
            "Navigation event: popstate (with state)".to_string(),
            "Navigation event: pagehide (entering the back-forward cache)".to_string(),
        ]
    );
    let entry = &tracker.entries_with_phase(LogPhase::Navigation)[0];
    assert_eq!(entry.target.as_deref(), Some("window"));
    Ok(())
}

#[test]
fn mousemove_inside_the_subtree_is_isolated() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["mousemove"])?;
    let body = page.select("body")?;
    let (body_hits, on_move) = counter("onMove");
    page.add_event_listener(body, "mousemove", &on_move, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.mouse_move(button)?;
    assert_eq!(body_hits.get(), 0);
    let outside = page.select("#outside")?;
    page.advance_time(500);
    page.mouse_move(outside)?;
    assert_eq!(body_hits.get(), 1);
    Ok(())
}

#[test]
fn in_page_anchor_opens_in_a_new_tab() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        ..
    } = fixture(&["click"])?;
    tracker.start_tracking(&mut page, root);
    let anchor = page.select("#anchor")?;
    let outcome = page.click(anchor)?;

    assert!(outcome.default_prevented);
    assert_eq!(
        page.opened_windows(),
        &[(
            "https://page.test/index.html#sec".to_string(),
            "_blank".to_string()
        )]
    );
    assert_eq!(page.location_hash(), "");
    assert!(
        messages(&tracker, LogPhase::Action)
            .contains(&"Intercepted in-page anchor to #sec, opened in a new tab".to_string())
    );
    Ok(())
}

#[test]
fn link_prevented_by_page_code_gets_a_follow_up() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        ..
    } = fixture(&["click"])?;
    let mail = page.select("#mail")?;
    let cancel = Handler::new(app("cancelMail", 40), |_: &mut Page, event: &mut Event| {
        event.prevent_default();
        Ok(())
    });
    page.add_event_listener(mail, "click", &cancel, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.click(mail)?;
    assert!(
        messages(&tracker, LogPhase::Action)
            .contains(&"Link: mail, href: mailto:team@page.test".to_string())
    );
    let prevented = "Default navigation was prevented by page code".to_string();
    assert!(!messages(&tracker, LogPhase::Info).contains(&prevented));
    page.advance_time(0);
    assert!(messages(&tracker, LogPhase::Info).contains(&prevented));
    Ok(())
}

#[test]
fn form_submit_is_described_and_prevention_reported() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        ..
    } = fixture(&["submit"])?;
    let form = page.select("#f")?;
    let cancel = Handler::new(app("validate", 50), |_: &mut Page, event: &mut Event| {
        event.prevent_default();
        Ok(())
    });
    page.add_event_listener(form, "submit", &cancel, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.submit(form)?;
    assert!(page.navigations().is_empty());
    assert!(messages(&tracker, LogPhase::Action).contains(
        &"Form submit: action=/save, method=POST, 3 fields, includes a file upload".to_string()
    ));
    page.advance_time(0);
    assert!(
        messages(&tracker, LogPhase::Info)
            .contains(&"Default form submission was prevented".to_string())
    );
    Ok(())
}

#[test]
fn stopping_from_inside_a_page_handler_is_deferred_safely() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    let native = page.entry_points();
    let remote = tracker.clone();
    let stopper = Handler::new(app("closeTool", 60), move |page: &mut Page, _: &mut Event| {
        remote.stop_tracking(page);
        Ok(())
    });
    page.add_event_listener(button, "click", &stopper, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.click(button)?;
    page.advance_time(0);

    assert!(!tracker.is_tracking());
    assert!(page.entry_points().same_as(&native));
    assert!(page.take_uncaught_errors().is_empty());
    Ok(())
}

#[test]
fn view_source_button_opens_the_external_script() -> Result<()> {
    let mut page = Page::from_html(
        r#"<script src="/app.js"></script>
           <div id="x"><button id="b">go</button></div>
           <div id="out" class="event-tracker-output"></div>"#,
    )?;
    let body = (1..=15)
        .map(|line| format!("line {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    page.add_resource("/app.js", &body);
    let root = page.select("#x")?;
    let button = page.select("#b")?;
    let tracker = EventTracker::new(page.select("#out")?)?;
    tracker.set_selected_event_types(&mut page, SelectedEventTypes::only(["click"]));
    tracker.start_tracking(&mut page, root);

    page.run_script(
        SourceLocation::new("clickIt", "https://page.test/app.js", 12, 3),
        |page| page.click(button),
    )?;
    let view_source = page.select("#out .view-source-btn")?;
    page.click(view_source)?;
    assert!(tracker.source_view().is_none());
    page.advance_time(0);

    let view = tracker.source_view().ok_or(dom_event_tracker::Error::Config(
        "source viewer did not open".into(),
    ))?;
    assert_eq!(
        view.origin,
        SourceOrigin::External("https://page.test/app.js".into())
    );
    assert_eq!(view.highlighted_line(), Some("line 12"));
    let highlighted = page.select("#event-tracker-source-viewer .line.highlighted")?;
    assert!(page.dom().text_content(highlighted).contains("line 12"));
    // Tracker UI clicks are never logged as page events.
    assert_eq!(tracker.entries_with_phase(LogPhase::Capture).len(), 1);
    Ok(())
}

#[test]
fn plain_button_is_described_by_its_tag() -> Result<()> {
    let mut page = Page::from_html(
        "<div id='x'><button>go</button></div><div id='out' class='event-tracker-output'></div>",
    )?;
    let root = page.select("#x")?;
    let button = page.select("#x button")?;
    let tracker = EventTracker::new(page.select("#out")?)?;
    tracker.set_selected_event_types(&mut page, SelectedEventTypes::only(["click"]));
    tracker.start_tracking(&mut page, root);
    page.click(button)?;

    let targets: Vec<Option<String>> = tracker
        .entries()
        .into_iter()
        .filter(|entry| matches!(entry.phase, LogPhase::Capture | LogPhase::Bubble))
        .map(|entry| entry.target)
        .collect();
    assert_eq!(targets, vec![Some("button".to_string()), Some("button".to_string())]);
    Ok(())
}

#[test]
fn changing_the_selection_restarts_without_leftover_listeners() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click", "dblclick"])?;
    tracker.start_tracking(&mut page, root);
    tracker.set_selected_event_types(&mut page, SelectedEventTypes::only(["dblclick"]));
    assert!(tracker.is_tracking());
    assert_eq!(tracker.target(), Some(root));

    page.click(button)?;
    page.dispatch_event(button, "dblclick")?;
    let logged: Vec<Option<String>> = tracker
        .entries_with_phase(LogPhase::Capture)
        .into_iter()
        .map(|entry| entry.event_type)
        .collect();
    assert_eq!(logged, vec![Some("dblclick".to_string())]);
    let document = page.document();
    assert_eq!(page.listener_count(document, "click"), 0);
    Ok(())
}

#[test]
fn handler_is_logged_again_after_removal() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        ..
    } = fixture(&["click"])?;
    tracker.start_tracking(&mut page, root);
    let (_, on_root) = counter("onRoot");
    page.add_event_listener(root, "click", &on_root, ListenerOptions::capture());
    page.add_event_listener(root, "click", &on_root, ListenerOptions::capture());
    page.remove_event_listener(root, "click", &on_root, ListenerOptions::capture());
    page.add_event_listener(root, "click", &on_root, ListenerOptions::capture().once());

    let added: Vec<String> = messages(&tracker, LogPhase::Info)
        .into_iter()
        .filter(|message| message.starts_with("Listener added"))
        .collect();
    assert_eq!(
        added,
        vec![
            r#"Listener added: click on div#x {"capture":true,"once":false,"passive":false}"#
                .to_string(),
            r#"Listener added: click on div#x {"capture":true,"once":true,"passive":false}"#
                .to_string(),
        ]
    );
    Ok(())
}

fn scope_recorder(tracker: &EventTracker) -> (Rc<RefCell<Vec<(String, bool)>>>, Handler) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let tracker = tracker.clone();
    let handler = Handler::new(app("onAny", 3), move |page: &mut Page, event: &mut Event| {
        let in_scope = tracker.is_in_scope(page, event);
        sink.borrow_mut().push((event.event_type().to_string(), in_scope));
        Ok(())
    });
    (seen, handler)
}

#[test]
fn scope_needs_a_selected_type_and_the_tracked_subtree() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    let outside = page.select("#outside")?;
    let (seen, on_any) = scope_recorder(&tracker);
    page.add_event_listener(button, "click", &on_any, ListenerOptions::bubble());
    page.add_event_listener(button, "dblclick", &on_any, ListenerOptions::bubble());
    page.add_event_listener(outside, "click", &on_any, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.dispatch_event(button, "click")?;
    page.dispatch_event(button, "dblclick")?;
    page.dispatch_event(outside, "click")?;
    tracker.stop_tracking(&mut page);
    page.dispatch_event(button, "click")?;

    let expected: Vec<(String, bool)> = [
        ("click", true),
        ("dblclick", false),
        ("click", false),
        ("click", false),
        ("click", false),
    ]
    .into_iter()
    .map(|(event_type, in_scope)| (event_type.to_string(), in_scope))
    .collect();
    assert_eq!(*seen.borrow(), expected);
    Ok(())
}

#[test]
fn event_whose_target_leaves_the_subtree_mid_dispatch_stays_in_scope() -> Result<()> {
    let config = TrackerConfig {
        isolate_propagation: false,
        ..TrackerConfig::default()
    };
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture_with(config, &["click"])?;
    let outside = page.select("#outside")?;
    let detach = Handler::new(app("detachButton", 30), move |page: &mut Page, _: &mut Event| {
        page.append_child(outside, button)?;
        Ok(())
    });
    page.add_event_listener(root, "click", &detach, ListenerOptions::capture());
    let (seen, on_any) = scope_recorder(&tracker);
    page.add_event_listener(button, "click", &on_any, ListenerOptions::bubble());

    tracker.start_tracking(&mut page, root);
    page.dispatch_event(button, "click")?;

    assert!(!page.dom().contains(root, button));
    assert_eq!(*seen.borrow(), vec![("click".to_string(), true)]);
    assert_eq!(
        messages(&tracker, LogPhase::Bubble),
        vec!["click (bubble phase) on button#b.primary".to_string()]
    );
    Ok(())
}

#[test]
fn interleaved_trackers_leave_the_original_entry_points() -> Result<()> {
    let Fixture {
        mut page,
        tracker: first,
        root,
        button,
    } = fixture(&["click"])?;
    let native = page.entry_points();
    let second = EventTracker::new(page.select("#out")?)?;
    second.set_selected_event_types(&mut page, SelectedEventTypes::only(["click"]));
    let document = page.document();

    first.start_tracking(&mut page, root);
    second.start_tracking(&mut page, root);
    first.stop_tracking(&mut page);
    assert!(!page.entry_points().same_as(&native));

    let (_, on_save) = counter("onSave");
    page.add_event_listener(button, "click", &on_save, ListenerOptions::bubble());
    let added = |tracker: &EventTracker| {
        messages(tracker, LogPhase::Info)
            .into_iter()
            .filter(|message| message.starts_with("Listener added"))
            .count()
    };
    assert_eq!(added(&second), 1);
    assert_eq!(added(&first), 0);

    second.stop_tracking(&mut page);
    assert!(page.entry_points().same_as(&native));
    assert_eq!(page.listener_count(document, "click"), 0);

    first.start_tracking(&mut page, root);
    second.start_tracking(&mut page, root);
    second.stop_tracking(&mut page);
    first.stop_tracking(&mut page);
    assert!(page.entry_points().same_as(&native));
    assert_eq!(page.listener_count(document, "click"), 0);
    Ok(())
}

#[test]
fn removal_outside_the_subtree_keeps_the_record() -> Result<()> {
    let Fixture {
        mut page,
        tracker,
        root,
        button,
    } = fixture(&["click"])?;
    tracker.start_tracking(&mut page, root);
    let outside = page.select("#outside")?;
    let (_, on_save) = counter("onSave");
    page.add_event_listener(button, "click", &on_save, ListenerOptions::bubble());
    page.add_event_listener(outside, "click", &on_save, ListenerOptions::bubble());
    page.remove_event_listener(outside, "click", &on_save, ListenerOptions::bubble());
    assert!(!page.has_listener(outside, "click", &on_save, false));

    // Still recorded, so registering it again in scope stays quiet.
    page.add_event_listener(button, "click", &on_save, ListenerOptions::capture());
    let info = messages(&tracker, LogPhase::Info);
    assert_eq!(
        info.iter()
            .filter(|message| message.starts_with("Listener added"))
            .count(),
        1
    );
    assert!(!info.iter().any(|message| message.starts_with("Listener removed")));
    Ok(())
}

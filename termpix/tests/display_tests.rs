// ABOUTME: End-to-end tests of the Display facade against mock tools
// ABOUTME: Covers protocol selection, Kitty caching and swaps, overlay clears, and failure paths

mod common;

use common::{FixedProbe, MockTools, Terminal, init_logging};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use termpix::image_protocols::{
    Environment, ExternalTools, NormalizedCache, TargetArea, W3mProtocol,
};
use termpix::{Display, Protocol, TermpixConfig};

struct Harness {
    tools: Rc<MockTools>,
    terminal: Terminal,
    display: Display,
    dir: TempDir,
}

impl Harness {
    fn build(
        protocol: Option<Protocol>,
        tools: MockTools,
        probe: &FixedProbe,
        env: &[(&str, &str)],
        config: TermpixConfig,
    ) -> Self {
        init_logging();
        let tools = Rc::new(tools);
        let terminal = Terminal::default();
        let shared: Rc<dyn ExternalTools> = tools.clone();
        let display = Display::with_parts(
            protocol,
            shared,
            probe,
            &Environment::from_pairs(env.iter().copied()),
            Box::new(terminal.clone()),
            &config,
        );
        Self {
            tools,
            terminal,
            display,
            dir: TempDir::new().unwrap(),
        }
    }

    fn kitty() -> Self {
        Self::build(
            Some(Protocol::Kitty),
            MockTools::new((1600, 1200)),
            &FixedProbe::default(),
            &[],
            TermpixConfig::default(),
        )
    }

    fn image(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"image bytes").unwrap();
        path
    }
}

#[test]
fn test_unsupported_terminal_never_touches_tools() {
    let mut h = Harness::build(
        None,
        MockTools::new((100, 100)),
        &FixedProbe::default(),
        &[("TERM", "dumb")],
        TermpixConfig::default(),
    );
    let image = h.image("a.png");

    assert!(!h.display.supported());
    assert_eq!(h.display.protocol(), None);
    assert!(!h.display.show(&image, 0, 0, 20, 10));
    assert!(!h.display.clear());
    assert!(h.tools.calls.borrow().is_empty());
    assert!(h.terminal.output().is_empty());
}

#[test]
fn test_sixel_terminal_is_detected() {
    let probe = FixedProbe::with_commands(&["convert"]);
    let mut h = Harness::build(
        None,
        MockTools::new((1600, 1200)),
        &probe,
        &[("TERM", "xterm-256color")],
        TermpixConfig::default(),
    );
    let image = h.image("a.png");

    assert_eq!(h.display.protocol(), Some(Protocol::Sixel));
    assert!(!h.display.atomic_replace());
    assert!(h.display.show(&image, 0, 0, 20, 10));
    assert_eq!(h.tools.count("rasterize 200x200 Sixel"), 1);
    assert!(h.terminal.output().starts_with("\x1b[0;0H"));
}

#[test]
fn test_overlay_is_detected_without_sixel() {
    let probe = FixedProbe::with_commands(&["xwininfo", "xdotool", "identify"])
        .with_file("/usr/libexec/w3m/w3mimgdisplay");
    let h = Harness::build(
        None,
        MockTools::new((100, 100)),
        &probe,
        &[("TERM", "linux")],
        TermpixConfig::default(),
    );

    assert_eq!(h.display.protocol(), Some(Protocol::W3m));
    assert!(h.display.supported());
}

#[test]
fn test_env_override_selects_kitty() {
    let probe = FixedProbe::with_commands(&["convert"]);
    let h = Harness::build(
        None,
        MockTools::new((100, 100)),
        &probe,
        &[("TERM", "xterm-kitty"), ("TERMPIX_PROTOCOL", "kitty")],
        TermpixConfig::default(),
    );

    assert_eq!(h.display.protocol(), Some(Protocol::Kitty));
    assert!(h.display.atomic_replace());
}

#[test]
fn test_missing_file_returns_false() {
    let mut h = Harness::kitty();

    assert!(!h.display.show("/tmp/missing.png", 0, 0, 20, 10));
    assert!(h.tools.calls.borrow().is_empty());
    assert_eq!(h.display.info().current_image, None);
}

#[test]
fn test_kitty_reuses_transmission_for_unchanged_area() {
    let mut h = Harness::kitty();
    let image = h.image("a.png");

    assert!(h.display.show(&image, 0, 0, 40, 15));
    assert!(h.display.show(&image, 0, 0, 40, 15));

    assert_eq!(h.tools.count("rasterize"), 1);
    let output = h.terminal.output();
    assert_eq!(output.matches("a=t,").count(), 1);
    assert_eq!(output.matches("a=p,").count(), 2);
    assert!(!output.contains("a=d"));
}

#[test]
fn test_kitty_new_area_transmits_new_image() {
    let mut h = Harness::kitty();
    let image = h.image("a.png");

    assert!(h.display.show(&image, 0, 0, 40, 15));
    assert!(h.display.show(&image, 0, 0, 20, 10));

    assert_eq!(h.tools.count("rasterize"), 2);
    let output = h.terminal.output();
    let ids: Vec<&str> = output
        .match_indices("a=t,f=100,i=")
        .map(|(start, _)| {
            let rest = &output[start + "a=t,f=100,i=".len()..];
            &rest[..rest.find(',').unwrap()]
        })
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_kitty_small_image_in_new_box_is_retransmitted() {
    let mut h = Harness::build(
        Some(Protocol::Kitty),
        MockTools::new((100, 100)),
        &FixedProbe::default(),
        &[],
        TermpixConfig::default(),
    );
    let image = h.image("icon.png");

    assert!(h.display.show(&image, 0, 0, 40, 15));
    assert!(h.display.show(&image, 0, 0, 20, 10));

    assert_eq!(h.tools.count("rasterize 100x100"), 2);
    assert_eq!(h.terminal.output().matches("a=t,").count(), 2);
    assert_eq!(h.terminal.output().matches("a=d,d=i,").count(), 1);
}

#[test]
fn test_kitty_cursor_uses_caller_coordinates() {
    let mut h = Harness::kitty();
    let image = h.image("a.png");

    assert!(h.display.show(&image, 5, 7, 40, 15));
    assert!(h.terminal.output().contains("\x1b[7;5H\x1b_Ga=p,"));
}

#[test]
fn test_kitty_swap_places_new_before_deleting_old() {
    let mut h = Harness::kitty();
    let first = h.image("first.png");
    let second = h.image("second.png");

    assert!(h.display.show(&first, 0, 0, 40, 15));
    let after_first = h.terminal.output().len();
    assert!(h.display.show(&second, 0, 0, 40, 15));

    let output = h.terminal.output();
    let swap = &output[after_first..];
    let place = swap.find("a=p,").unwrap();
    let delete = swap.find("a=d,d=i,").unwrap();
    assert!(place < delete);
}

#[test]
fn test_clear_resets_current_image() {
    let mut h = Harness::kitty();
    let image = h.image("a.png");

    assert!(h.display.show(&image, 3, 2, 40, 15));
    assert_eq!(h.display.info().current_image, Some(image));

    assert!(h.display.clear());
    let info = h.display.info();
    assert_eq!(info.current_image, None);
    assert_eq!(info.protocol, Some(Protocol::Kitty));
    assert!(info.supported);
    assert!(h.display.atomic_replace());
}

#[test]
fn test_kitty_cache_limit_from_config() {
    let config = TermpixConfig {
        max_cached_images: Some(1),
        ..Default::default()
    };
    let mut h = Harness::build(
        Some(Protocol::Kitty),
        MockTools::new((1600, 1200)),
        &FixedProbe::default(),
        &[],
        config,
    );
    let first = h.image("first.png");
    let second = h.image("second.png");

    assert!(h.display.show(&first, 0, 0, 40, 15));
    assert!(h.display.show(&second, 0, 0, 40, 15));

    assert!(h.terminal.output().contains(",d=I,"));
}

#[test]
fn test_overlay_show_and_clear() {
    let mut h = Harness::build(
        Some(Protocol::W3m),
        MockTools::new((1600, 1200)),
        &FixedProbe::default(),
        &[],
        TermpixConfig::default(),
    );
    let image = h.image("a.png");

    assert!(h.display.show(&image, 2, 3, 40, 10));
    assert!(h.display.clear());

    let sent = h.tools.overlay.borrow();
    assert_eq!(
        sent[0],
        format!("0;1;32;90;400;300;;;;;{}\n4;\n3;\n", image.display())
    );
    assert_eq!(sent[1], "6;16;90;672;300;\n4;\n3;\n");
}

#[test]
fn test_overlay_normalizes_into_configured_cache() {
    let cache_dir = TempDir::new().unwrap();
    let config = TermpixConfig {
        cache_dir: Some(cache_dir.path().to_path_buf()),
        ..Default::default()
    };
    let mut tools = MockTools::new((600, 800));
    tools.orientation = "LeftBottom".to_string();
    let mut h = Harness::build(
        Some(Protocol::W3m),
        tools,
        &FixedProbe::default(),
        &[],
        config,
    );
    let image = h.image("phone.jpg");
    let normalized = NormalizedCache::new(cache_dir.path()).path_for(&image);

    assert!(h.display.show(&image, 0, 0, 80, 24));
    assert!(h.display.show(&image, 0, 0, 80, 24));

    assert!(normalized.exists());
    assert_eq!(h.tools.count("normalize"), 1);
    assert!(h.tools.overlay.borrow()[0].contains(&normalized.display().to_string()));
}

#[test]
fn test_overlay_clear_region_without_geometry() {
    let mut tools = MockTools::new((100, 100));
    tools.window = None;
    let tools = Rc::new(tools);
    let shared: Rc<dyn ExternalTools> = tools.clone();
    let cache = TempDir::new().unwrap();
    let w3m = W3mProtocol::new(
        shared,
        PathBuf::from("/usr/lib/w3m/w3mimgdisplay"),
        NormalizedCache::new(cache.path()),
    );

    assert!(w3m.clear_region(&TargetArea::new(0, 0, 80, 24), 80, 24));
    assert_eq!(tools.count("send_overlay"), 0);
    assert!(w3m.helper().ends_with(Path::new("w3mimgdisplay")));
}

mod common;

use std::fs;
use std::sync::Arc;

use common::{build_registry, shader_text, write, Channel, ScriptedBackend, TextLoader, MAIN_SOURCE};
use hotreload::{
    BindingHandle, OffscreenTarget, RegistryBuilder, RegistryError, ReloadOutcome, ReloadSource,
    Resource, ResourceKind, Slot, Viewport, WatchId,
};

const VIEWPORT: Viewport = Viewport {
    width: 320,
    height: 240,
};

#[test]
fn startup_creates_one_binding_and_watch_per_resource() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let buffer = write(dir.path(), "buffer.glsl", "buffer v1");
    let noise = write(dir.path(), "noise.png", "noise");
    let backend = ScriptedBackend::new();

    let registry = build_registry(
        backend.clone(),
        VIEWPORT,
        &main,
        &[Channel::Shader(&buffer), Channel::Texture(&noise)],
        true,
    );

    assert_eq!(registry.len(), 3);
    assert_eq!(backend.subscription_count(), 3);
    registry.with_resources(|bindings| {
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings.watches().len(), 3);

        let slots: Vec<Slot> = bindings.iter().map(|binding| binding.slot()).collect();
        assert_eq!(slots, vec![Slot::Main, Slot::Channel(0), Slot::Channel(1)]);

        let mut ids: Vec<WatchId> = bindings.iter().filter_map(|b| b.watch_id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        let shader = &bindings.channels()[0];
        assert_eq!(shader.kind(), ResourceKind::Shader);
        assert_eq!(shader.target().map(|t| t.size()), Some(VIEWPORT));

        let texture = &bindings.channels()[1];
        assert_eq!(texture.kind(), ResourceKind::Texture);
        assert!(texture.target().is_none());
        assert!(bindings.main().target().is_none());
    });
}

#[test]
fn shared_paths_get_distinct_watch_identities() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let noise = write(dir.path(), "noise.png", "noise");
    let backend = ScriptedBackend::new();

    let registry = build_registry(
        backend.clone(),
        VIEWPORT,
        &main,
        &[Channel::Texture(&noise), Channel::Texture(&noise)],
        true,
    );

    let ids = backend.ids_for(&noise);
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(registry.resolve_watch(ids[0]), Some(BindingHandle::channel(0)));
    assert_eq!(registry.resolve_watch(ids[1]), Some(BindingHandle::channel(1)));
}

#[test]
fn reload_from_disk_replaces_content_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let buffer = write(dir.path(), "buffer.glsl", "buffer v1");
    let registry = build_registry(
        ScriptedBackend::new(),
        VIEWPORT,
        &main,
        &[Channel::Shader(&buffer)],
        true,
    );

    fs::write(&buffer, "buffer v2").unwrap();
    let generation = registry
        .reload(BindingHandle::channel(0), ReloadSource::Disk)
        .expect("reload");

    assert_eq!(generation, 1);
    assert_eq!(shader_text(&registry, BindingHandle::channel(0)), "buffer v2");
    registry.with_resources(|bindings| {
        let binding = &bindings.channels()[0];
        assert_eq!(binding.kind(), ResourceKind::Shader);
        assert!(binding.target().is_some());
    });
}

#[test]
fn reload_from_bytes_skips_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let registry = build_registry(ScriptedBackend::new(), VIEWPORT, &main, &[], true);

    registry
        .reload(BindingHandle::MAIN, ReloadSource::Bytes(b"main v2".to_vec()))
        .expect("reload");

    assert_eq!(shader_text(&registry, BindingHandle::MAIN), "main v2");
    assert_eq!(fs::read_to_string(&main).unwrap(), MAIN_SOURCE);
}

#[test]
fn failed_reload_keeps_previous_content() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let noise = write(dir.path(), "noise.png", "noise");
    let registry = build_registry(
        ScriptedBackend::new(),
        VIEWPORT,
        &main,
        &[Channel::Texture(&noise)],
        true,
    );

    let err = registry
        .reload(BindingHandle::MAIN, ReloadSource::Bytes(b"#error".to_vec()))
        .expect_err("broken shader");
    assert!(matches!(err, RegistryError::ResourceLoad { slot: Slot::Main, .. }));

    fs::write(&noise, "BAD bytes").unwrap();
    let err = registry
        .reload(BindingHandle::channel(0), ReloadSource::Disk)
        .expect_err("broken texture");
    assert!(err.to_string().contains("unreadable image"));

    assert_eq!(shader_text(&registry, BindingHandle::MAIN), MAIN_SOURCE);
    assert_eq!(shader_text(&registry, BindingHandle::channel(0)), "noise");
    registry.with_resources(|bindings| {
        assert!(bindings.iter().all(|binding| binding.generation() == 0));
    });
}

#[test]
fn reload_of_deleted_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let registry = build_registry(ScriptedBackend::new(), VIEWPORT, &main, &[], true);

    fs::remove_file(&main).unwrap();
    let err = registry
        .reload(BindingHandle::MAIN, ReloadSource::Disk)
        .expect_err("missing file");
    assert!(matches!(err, RegistryError::ResourceLoad { .. }));
    assert_eq!(shader_text(&registry, BindingHandle::MAIN), MAIN_SOURCE);
}

#[test]
fn reload_of_unknown_binding_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let registry = build_registry(ScriptedBackend::new(), VIEWPORT, &main, &[], true);

    let err = registry
        .reload(BindingHandle::channel(3), ReloadSource::Disk)
        .expect_err("unknown");
    assert!(matches!(err, RegistryError::UnknownBinding(handle) if handle == BindingHandle::channel(3)));
}

#[test]
fn watched_reload_honours_auto_reload_flag() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let backend = ScriptedBackend::new();
    let registry = build_registry(backend.clone(), VIEWPORT, &main, &[], false);
    let id = backend.ids_for(&main)[0];

    fs::write(&main, "main v2").unwrap();
    assert_eq!(
        registry.reload_watched(id).unwrap(),
        ReloadOutcome::Skipped(BindingHandle::MAIN)
    );
    assert_eq!(shader_text(&registry, BindingHandle::MAIN), MAIN_SOURCE);

    registry.with_resources(|bindings| {
        bindings
            .get_mut(BindingHandle::MAIN)
            .expect("main")
            .set_auto_reload(true);
    });
    assert_eq!(
        registry.reload_watched(id).unwrap(),
        ReloadOutcome::Reloaded {
            handle: BindingHandle::MAIN,
            generation: 1,
        }
    );
    assert_eq!(shader_text(&registry, BindingHandle::MAIN), "main v2");
}

#[test]
fn watched_reload_of_unknown_identity_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let registry = build_registry(ScriptedBackend::new(), VIEWPORT, &main, &[], true);

    assert_eq!(
        registry.reload_watched(WatchId::new(99)).unwrap(),
        ReloadOutcome::Unknown
    );
    assert_eq!(shader_text(&registry, BindingHandle::MAIN), MAIN_SOURCE);
}

#[test]
fn startup_watch_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let mut builder = RegistryBuilder::new(
        TextLoader,
        ScriptedBackend::new(),
        VIEWPORT,
        &main,
        MAIN_SOURCE.to_owned(),
        true,
    )
    .unwrap();

    let err = builder
        .register(
            &dir.path().join("gone.png"),
            Resource::Texture("gone".to_owned()),
            true,
        )
        .expect_err("missing channel");
    assert!(matches!(
        err,
        RegistryError::WatchRegistration {
            slot: Slot::Channel(0),
            ..
        }
    ));

    let missing_main = RegistryBuilder::new(
        TextLoader,
        ScriptedBackend::new(),
        VIEWPORT,
        &dir.path().join("missing.glsl"),
        MAIN_SOURCE.to_owned(),
        true,
    );
    assert!(missing_main.is_err());
}

#[test]
fn startup_channel_that_fails_to_load_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let broken = write(dir.path(), "broken.glsl", "void mainImage() { #error }");
    let corrupt = write(dir.path(), "corrupt.png", "BAD header");
    let noise = write(dir.path(), "noise.png", "noise");
    let backend = ScriptedBackend::new();
    let mut builder = RegistryBuilder::new(
        TextLoader,
        backend.clone(),
        VIEWPORT,
        &main,
        MAIN_SOURCE.to_owned(),
        true,
    )
    .unwrap();

    let skipped_shader = builder.load(&broken, ResourceKind::Shader, true).unwrap();
    let skipped_texture = builder.load(&corrupt, ResourceKind::Texture, true).unwrap();
    let loaded = builder.load(&noise, ResourceKind::Texture, true).unwrap();
    let registry = builder.build();

    assert_eq!(skipped_shader, None);
    assert_eq!(skipped_texture, None);
    assert_eq!(loaded, Some(BindingHandle::channel(0)));
    assert_eq!(registry.len(), 2);
    assert_eq!(backend.subscription_count(), 2);
    assert_eq!(shader_text(&registry, BindingHandle::channel(0)), "noise");
}

#[test]
fn startup_channel_missing_on_disk_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let mut builder = RegistryBuilder::new(
        TextLoader,
        ScriptedBackend::new(),
        VIEWPORT,
        &main,
        MAIN_SOURCE.to_owned(),
        true,
    )
    .unwrap();

    let missing = builder
        .load(&dir.path().join("gone.png"), ResourceKind::Texture, true)
        .unwrap();
    assert_eq!(missing, None);
    assert_eq!(builder.build().len(), 1);
}

#[test]
fn stand_in_main_shader_is_replaced_by_first_good_save() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", "void mainImage() { #error }");
    let backend = ScriptedBackend::new();
    let registry = RegistryBuilder::new(
        TextLoader,
        backend.clone(),
        VIEWPORT,
        &main,
        "stand-in".to_owned(),
        true,
    )
    .unwrap()
    .build();
    let id = backend.ids_for(&main)[0];

    assert!(registry.reload_watched(id).is_err());
    assert_eq!(shader_text(&registry, BindingHandle::MAIN), "stand-in");

    fs::write(&main, MAIN_SOURCE).unwrap();
    assert_eq!(
        registry.reload_watched(id).unwrap(),
        ReloadOutcome::Reloaded {
            handle: BindingHandle::MAIN,
            generation: 1,
        }
    );
    assert_eq!(shader_text(&registry, BindingHandle::MAIN), MAIN_SOURCE);
}

#[test]
fn dynamic_registration_survives_watch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let backend = ScriptedBackend::new();
    let registry = build_registry(backend.clone(), VIEWPORT, &main, &[], true);

    let handle = registry.register(
        &dir.path().join("gone.png"),
        Resource::Texture("in memory".to_owned()),
        true,
    );

    assert_eq!(handle, BindingHandle::channel(0));
    assert_eq!(registry.len(), 2);
    assert_eq!(backend.subscription_count(), 1);
    registry.with_resources(|bindings| {
        let binding = bindings.get(handle).expect("binding");
        assert!(binding.watch_id().is_none());
        assert_eq!(bindings.watches().len(), 1);
    });
    assert_eq!(shader_text(&registry, handle), "in memory");
}

#[test]
fn dynamic_registration_is_watched_and_sized() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let extra = write(dir.path(), "extra.glsl", "extra v1");
    let backend = ScriptedBackend::new();
    let registry = build_registry(backend.clone(), VIEWPORT, &main, &[], true);
    let resized = Viewport::new(64, 32);
    registry.resize_targets(resized);

    let handle = registry.register(&extra, Resource::Shader("extra v1".to_owned()), true);

    let id = backend.ids_for(&extra)[0];
    assert_eq!(registry.resolve_watch(id), Some(handle));
    registry.with_resources(|bindings| {
        let binding = bindings.get(handle).expect("binding");
        assert_eq!(binding.target().map(|t| t.size()), Some(resized));
    });
}

#[test]
fn resize_only_touches_targets_that_differ() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.glsl", MAIN_SOURCE);
    let buffer = write(dir.path(), "buffer.glsl", "buffer v1");
    let registry = Arc::new(build_registry(
        ScriptedBackend::new(),
        VIEWPORT,
        &main,
        &[Channel::Shader(&buffer)],
        true,
    ));

    registry.resize_targets(VIEWPORT);
    registry.resize_targets(Viewport::new(800, 600));

    assert_eq!(registry.viewport(), Viewport::new(800, 600));
    registry.with_resources(|bindings| {
        let target = bindings.channels()[0].target().expect("target");
        assert_eq!(target.size, Viewport::new(800, 600));
        assert_eq!(target.resizes, 1);
    });
}

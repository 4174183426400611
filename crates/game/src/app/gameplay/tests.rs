    use super::*;
    use jumper_engine::ecs::{DamageRecord, Pool};
    use jumper_engine::map::{MapChangeHandle, MapState, TileLayerCatalog};
    use jumper_engine::render::Camera2D;
    use jumper_engine::InputAction;

    const DT: f32 = 1.0 / 60.0;

    struct Harness {
        world: World,
        pool: Pool<DamageRecord>,
        camera: Camera2D,
        map_change: MapChangeHandle,
    }

    impl Harness {
        fn new(pool_capacity: usize) -> Self {
            Self {
                world: World::default(),
                pool: Pool::with_capacity(pool_capacity),
                camera: Camera2D::default(),
                map_change: MapChangeHandle::default(),
            }
        }

        fn with_ctx<R>(&mut self, f: impl FnOnce(&mut SceneContext<'_>) -> R) -> R {
            let mut ctx = SceneContext {
                world: &mut self.world,
                damage_pool: &mut self.pool,
                camera: &mut self.camera,
                map_change: &self.map_change,
            };
            let result = f(&mut ctx);
            let _ = self.world.apply_pending();
            result
        }

        fn load(&mut self, scene: &mut PlatformerScene) {
            self.with_ctx(|ctx| scene.load(ctx));
        }

        fn tick(&mut self, scene: &mut PlatformerScene, input: InputSnapshot) -> SceneCommand {
            self.with_ctx(|ctx| scene.update(DT, &input, ctx))
        }

        fn count_named(&self, debug_name: &str) -> usize {
            self.world
                .entities()
                .iter()
                .filter(|entity| entity.debug_name == debug_name)
                .count()
        }
    }

    /// Ten by four tiles with a solid bottom row, so standing height is `y = 1`.
    fn arena_map(objects: Vec<MapObject>) -> TiledMap {
        let tiles = (0..40).map(|index| if index >= 30 { 1 } else { 0 }).collect();
        let ground = TileLayer::new("ground", 10, 4, tiles)
            .expect("ground layer")
            .with_property(SOLID_LAYER_PROPERTY, PropertyValue::Bool(true));
        TiledMap::new("arena", 10, 4)
            .with_layer(MapLayer::Tile(ground))
            .with_layer(MapLayer::Object(ObjectLayer {
                name: "spawns".to_string(),
                visible: true,
                objects,
                properties: Properties::default(),
            }))
    }

    fn arena_scene(enemy_health: f32) -> PlatformerScene {
        let map = arena_map(vec![
            demo_object(1, PLAYER_OBJECT_KIND, Vec2::new(1.0, 1.0), None),
            demo_object(2, ENEMY_OBJECT_KIND, Vec2::new(1.9, 1.0), Some(enemy_health)),
        ]);
        let settings = GameplaySettings {
            attack_damage: 1.0,
            ..GameplaySettings::default()
        };
        PlatformerScene::new(settings, Arc::new(map), SceneImages::default())
    }

    fn attack_input() -> InputSnapshot {
        InputSnapshot::empty().with_attack_pressed(true)
    }

    #[test]
    fn demo_map_splits_into_parallax_backgrounds_and_foreground() {
        let catalog = TileLayerCatalog::build(Arc::new(demo_map()));
        assert_eq!(catalog.background_count(), 2);
        assert_eq!(catalog.foreground_count(), 2);
        assert_eq!(catalog.parallax_table(), &[0.2, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn demo_spawn_points_read_player_and_enemy_health() {
        let spawns = SpawnPoints::from_map(&demo_map());
        assert_eq!(spawns.player, Vec2::new(2.0, 2.0));
        let healths: Vec<f32> = spawns.enemies.iter().map(|enemy| enemy.health).collect();
        assert_eq!(healths, vec![ENEMY_DEFAULT_HEALTH, 2.0, 5.0]);
    }

    #[test]
    fn missing_player_spawn_falls_back_inside_map() {
        let spawns = SpawnPoints::from_map(&arena_map(Vec::new()));
        assert_eq!(spawns.player, Vec2::new(1.0, 2.0));
        assert!(spawns.enemies.is_empty());
    }

    #[test]
    fn solid_grid_marks_ground_and_treats_edges_as_walls() {
        let grid = SolidGrid::from_map(&demo_map());
        assert!(grid.is_solid(0, 0));
        assert!(grid.is_solid(12, 4));
        assert!(grid.is_solid(30, 2));
        assert!(!grid.is_solid(5, 5));
        assert!(grid.is_solid(-1, 5));
        assert!(grid.is_solid(DEMO_MAP_WIDTH as i64, 5));
        assert!(grid.is_solid(5, -1));
        assert!(!grid.is_solid(5, DEMO_MAP_HEIGHT as i64));
    }

    #[test]
    fn background_layers_never_collide() {
        let sky = TileLayer::new("background_sky", 2, 2, vec![1; 4])
            .expect("layer")
            .with_property(SOLID_LAYER_PROPERTY, PropertyValue::Bool(true));
        let map = TiledMap::new("sky", 2, 2).with_layer(MapLayer::Tile(sky));
        assert_eq!(SolidGrid::from_map(&map).solid_count(), 0);
    }

    #[test]
    fn falling_body_lands_on_ground() {
        let grid = SolidGrid::from_map(&arena_map(Vec::new()));
        let mut body = Body {
            velocity: Vec2::new(0.0, -6.0),
            on_ground: false,
        };
        let position = step_body(&grid, Vec2::new(3.0, 1.05), PLAYER_SIZE, &mut body, 0.1);
        assert_eq!(position, Vec2::new(3.0, 1.0));
        assert!(body.on_ground);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn wall_stops_horizontal_movement() {
        let grid = SolidGrid::from_map(&demo_map());
        let mut body = Body {
            velocity: Vec2::new(6.0, 0.0),
            on_ground: true,
        };
        let position = step_body(&grid, Vec2::new(29.0, 2.0), PLAYER_SIZE, &mut body, 0.1);
        assert!((position.x - (30.0 - PLAYER_SIZE.x)).abs() < 1e-4);
        assert_eq!(body.velocity.x, 0.0);
    }

    #[test]
    fn load_publishes_map_and_spawns_entities() {
        let mut harness = Harness::new(4);
        let mut scene = PlatformerScene::new(
            GameplaySettings::default(),
            Arc::new(demo_map()),
            SceneImages::default(),
        );
        harness.load(&mut scene);

        assert_eq!(harness.count_named("player"), 1);
        assert_eq!(harness.count_named("enemy"), 3);

        let mut state = MapState::default();
        assert!(state.apply_pending(&harness.map_change));
        let catalog = state.catalog().expect("catalog");
        assert_eq!(catalog.map().name, DEMO_MAP_NAME);
    }

    #[test]
    fn enemy_without_image_keeps_imageless_visual() {
        let mut harness = Harness::new(4);
        let images = SceneImages {
            player: Some(ImageHandle(0)),
            enemy: None,
        };
        let mut scene = PlatformerScene::new(
            GameplaySettings::default(),
            Arc::new(arena_map(vec![
                demo_object(1, PLAYER_OBJECT_KIND, Vec2::new(1.0, 1.0), None),
                demo_object(2, ENEMY_OBJECT_KIND, Vec2::new(5.0, 1.0), None),
            ])),
            images,
        );
        harness.load(&mut scene);

        let visual_of = |name: &str| {
            harness
                .world
                .entities()
                .iter()
                .find(|entity| entity.debug_name == name)
                .and_then(|entity| entity.visual.as_ref())
                .map(|visual| visual.image)
        };
        assert_eq!(visual_of("player"), Some(Some(ImageHandle(0))));
        assert_eq!(visual_of("enemy"), Some(None));
    }

    #[test]
    fn quit_input_returns_quit_command() {
        let mut harness = Harness::new(4);
        let mut scene = arena_scene(3.0);
        harness.load(&mut scene);
        let command = harness.tick(&mut scene, InputSnapshot::empty().with_quit_requested(true));
        assert_eq!(command, SceneCommand::Quit);
    }

    #[test]
    fn player_walks_in_input_direction() {
        let mut harness = Harness::new(4);
        let mut scene = arena_scene(3.0);
        harness.load(&mut scene);
        let player_id = scene.player_id.expect("player");
        let start_x = harness
            .world
            .find_entity(player_id)
            .and_then(|entity| entity.spatial.as_ref())
            .map(|spatial| spatial.position.x)
            .expect("player position");

        let right = InputSnapshot::empty().with_action_down(InputAction::MoveRight, true);
        harness.tick(&mut scene, right);

        let spatial = harness
            .world
            .find_entity(player_id)
            .and_then(|entity| entity.spatial.as_ref())
            .expect("spatial");
        assert!(spatial.position.x > start_x);
        assert_eq!(scene.facing, Facing::Right);
    }

    #[test]
    fn jump_requires_ground_contact() {
        let mut harness = Harness::new(4);
        let mut scene = arena_scene(3.0);
        harness.load(&mut scene);

        let jump = InputSnapshot::empty().with_jump_pressed(true);
        harness.tick(&mut scene, jump);
        assert!(scene.body.on_ground, "first tick only settles onto the ground");

        harness.tick(&mut scene, jump);
        assert!(!scene.body.on_ground);
        let rising = scene.body.velocity.y;
        assert!(rising > 0.0);

        harness.tick(&mut scene, jump);
        assert!(scene.body.velocity.y < rising, "mid-air jump must not boost");
    }

    #[test]
    fn attack_defeats_adjacent_enemy_once_and_returns_record() {
        let mut harness = Harness::new(4);
        let mut scene = arena_scene(1.0);
        harness.load(&mut scene);

        harness.tick(&mut scene, attack_input());
        assert_eq!(harness.count_named("attack"), 1);
        assert_eq!(harness.pool.checked_out_count(), 1);

        harness.tick(&mut scene, InputSnapshot::empty());
        assert_eq!(harness.count_named("enemy"), 0);
        assert_eq!(harness.count_named("player"), 1);
        assert_eq!(scene.enemies_defeated, 1);

        for _ in 0..30 {
            harness.tick(&mut scene, InputSnapshot::empty());
        }
        assert_eq!(harness.count_named("attack"), 0);
        assert_eq!(harness.pool.checked_out_count(), 0);

        let title = scene.debug_title(&harness.world).expect("title");
        assert!(title.contains("defeated: 1"), "title={title}");
    }

    #[test]
    fn attack_hits_each_enemy_only_once() {
        let mut harness = Harness::new(4);
        let mut scene = arena_scene(3.0);
        harness.load(&mut scene);

        harness.tick(&mut scene, attack_input());
        for _ in 0..5 {
            harness.tick(&mut scene, InputSnapshot::empty());
        }

        let enemy = harness
            .world
            .entities()
            .iter()
            .find(|entity| entity.debug_name == "enemy")
            .expect("enemy survives");
        assert_eq!(enemy.health.map(|health| health.current), Some(2.0));
    }

    #[test]
    fn exhausted_pool_drops_attack_without_spawning() {
        let mut harness = Harness::new(1);
        let mut scene = arena_scene(10.0);
        harness.load(&mut scene);

        harness.tick(&mut scene, attack_input());
        harness.tick(&mut scene, attack_input());

        assert_eq!(harness.count_named("attack"), 1);
        assert_eq!(harness.pool.checked_out_count(), 1);
    }

/// Side-scrolling level: one player, stationary enemies with health, and a short-lived
/// melee attack that hits each enemy it overlaps once.
pub(crate) struct PlatformerScene {
    settings: GameplaySettings,
    map: Arc<TiledMap>,
    solids: SolidGrid,
    images: SceneImages,
    player_id: Option<EntityId>,
    body: Body,
    facing: Facing,
    enemies_defeated: u32,
}

impl PlatformerScene {
    pub(crate) fn new(settings: GameplaySettings, map: Arc<TiledMap>, images: SceneImages) -> Self {
        let solids = SolidGrid::from_map(&map);
        debug!(map = %map.name, solid_cells = solids.solid_count(), "solid_grid_built");
        Self {
            settings,
            map,
            solids,
            images,
            player_id: None,
            body: Body::default(),
            facing: Facing::default(),
            enemies_defeated: 0,
        }
    }

    fn spawn_player(&self, world: &mut World, position: Vec2) -> EntityId {
        world.spawn(EntityDesc {
            debug_name: "player",
            spatial: Some(SpatialComponent::new(position, PLAYER_SIZE)),
            visual: Some(entity_visual(self.images.player, PLAYER_SIZE)),
            health: Some(HealthComponent::new(PLAYER_MAX_HEALTH)),
            ..EntityDesc::default()
        })
    }

    fn spawn_enemy(&self, world: &mut World, spawn: EnemySpawn) -> EntityId {
        world.spawn(EntityDesc {
            debug_name: "enemy",
            spatial: Some(SpatialComponent::new(spawn.position, ENEMY_SIZE)),
            visual: Some(entity_visual(self.images.enemy, ENEMY_SIZE)),
            health: Some(HealthComponent::new(spawn.health)),
            ..EntityDesc::default()
        })
    }

    fn update_player(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut SceneContext<'_>,
        player_id: EntityId,
    ) {
        let Some(spatial) = ctx
            .world
            .find_entity_mut(player_id)
            .and_then(|entity| entity.spatial.as_mut())
        else {
            return;
        };

        let axis = input.horizontal_axis();
        self.facing = Facing::from_axis(axis, self.facing);
        self.body.velocity.x = axis * self.settings.player_speed;
        if input.jump_pressed() && self.body.on_ground {
            self.body.velocity.y = self.settings.jump_speed;
        }
        apply_gravity(&mut self.body, fixed_dt_seconds);
        spatial.position = step_body(
            &self.solids,
            spatial.position,
            spatial.size,
            &mut self.body,
            fixed_dt_seconds,
        );
        let bounds = spatial.bounds();

        if input.attack_pressed() {
            self.spawn_attack(ctx, player_id, bounds);
        }
    }

    fn spawn_attack(&self, ctx: &mut SceneContext<'_>, player_id: EntityId, player_bounds: Rect) {
        let x = match self.facing {
            Facing::Right => player_bounds.x + player_bounds.width,
            Facing::Left => player_bounds.x - ATTACK_SIZE.x,
        };
        let handle = match spawn_damage(
            ctx.damage_pool,
            player_id,
            self.settings.attack_damage,
            self.settings.attack_life_span,
        ) {
            Ok(handle) => handle,
            Err(error) => {
                warn!(error = %error, "attack_dropped");
                return;
            }
        };
        let attack_id = ctx.world.spawn(EntityDesc {
            debug_name: "attack",
            spatial: Some(SpatialComponent::new(
                Vec2::new(x, player_bounds.y),
                ATTACK_SIZE,
            )),
            particle: Some(ParticleComponent::new(SparkBurst::new(
                ATTACK_SPARK_COUNT,
                ATTACK_SPARK_SPEED,
                self.settings.attack_life_span,
                ATTACK_SPARK_COLOR,
            ))),
            damage: Some(handle),
            ..EntityDesc::default()
        });
        debug!(attack = attack_id.0, facing = ?self.facing, "attack_spawned");
    }

    fn follow_player(&self, ctx: &mut SceneContext<'_>) {
        let Some(bounds) = self
            .player_id
            .and_then(|id| ctx.world.find_entity(id))
            .and_then(|entity| entity.spatial.as_ref())
            .map(|spatial| spatial.bounds())
        else {
            return;
        };
        let center = Vec2::new(
            bounds.x + bounds.width * 0.5,
            bounds.y + bounds.height * 0.5,
        );
        ctx.camera.follow(center, self.map.width as f32);
    }
}

impl Scene for PlatformerScene {
    fn load(&mut self, ctx: &mut SceneContext<'_>) {
        ctx.map_change.publish(Arc::clone(&self.map));

        let spawns = SpawnPoints::from_map(&self.map);
        self.body = Body::default();
        self.facing = Facing::default();
        self.enemies_defeated = 0;
        self.player_id = Some(self.spawn_player(ctx.world, spawns.player));
        for spawn in &spawns.enemies {
            self.spawn_enemy(ctx.world, *spawn);
        }

        let center = Vec2::new(
            spawns.player.x + PLAYER_SIZE.x * 0.5,
            spawns.player.y + PLAYER_SIZE.y * 0.5,
        );
        ctx.camera.follow(center, self.map.width as f32);
        info!(
            map = %self.map.name,
            enemies = spawns.enemies.len(),
            "level_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut SceneContext<'_>,
    ) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }

        if let Some(player_id) = self.player_id {
            self.update_player(fixed_dt_seconds, input, ctx, player_id);
        }

        let report = run_damage_system(ctx.world, ctx.damage_pool, fixed_dt_seconds);
        if report.kills > 0 {
            self.enemies_defeated += report.kills;
            info!(
                kills = report.kills,
                total = self.enemies_defeated,
                "enemies_defeated"
            );
        }

        self.follow_player(ctx);
        SceneCommand::None
    }

    fn unload(&mut self, _ctx: &mut SceneContext<'_>) {
        info!(
            map = %self.map.name,
            enemies_defeated = self.enemies_defeated,
            "level_unloaded"
        );
        self.player_id = None;
    }

    fn debug_title(&self, world: &World) -> Option<String> {
        Some(format!(
            "{} | entities: {} | defeated: {}",
            self.map.name,
            world.entity_count(),
            self.enemies_defeated
        ))
    }
}

fn entity_visual(image: Option<ImageHandle>, size: Vec2) -> VisualComponent {
    match image {
        Some(image) => VisualComponent::new(image, size.x, size.y),
        None => VisualComponent::without_image(size.x, size.y),
    }
}

/// Moves `body` for one step and resolves against solid cells one axis at a time. Landing
/// on a cell sets `on_ground`; any blocked axis loses its velocity.
fn step_body(solids: &SolidGrid, position: Vec2, size: Vec2, body: &mut Body, dt: f32) -> Vec2 {
    let mut next = position;

    next.x += body.velocity.x * dt;
    if solids.overlaps(Rect::new(next.x, next.y, size.x, size.y)) {
        next.x = if body.velocity.x > 0.0 {
            (next.x + size.x).floor() - size.x
        } else {
            next.x.floor() + 1.0
        };
        body.velocity.x = 0.0;
    }

    body.on_ground = false;
    next.y += body.velocity.y * dt;
    if solids.overlaps(Rect::new(next.x, next.y, size.x, size.y)) {
        if body.velocity.y <= 0.0 {
            next.y = next.y.floor() + 1.0;
            body.on_ground = true;
        } else {
            next.y = (next.y + size.y).floor() - size.y;
        }
        body.velocity.y = 0.0;
    }

    next
}

fn apply_gravity(body: &mut Body, dt: f32) {
    body.velocity.y =
        (body.velocity.y - GRAVITY_UNITS_PER_SECOND_SQ * dt).max(-MAX_FALL_SPEED_UNITS_PER_SECOND);
}

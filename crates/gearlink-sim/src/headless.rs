//! Headless simulation smoke tests.
//!
//! Runs the full stack (core ordering, rapier3d world, transmission joint,
//! stats) from a TOML scene with no window or GPU, pure ECS.

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    use bevy::prelude::Mut;
    use gearlink_core::config::SceneConfig;
    use gearlink_model::gear::GearType;
    use gearlink_physics::joint::{AxisId, JointPhase, TransmissionJoint};
    use gearlink_physics::rapier::RapierWorld;

    use crate::CouplingStats;
    use crate::builder::SceneBuilder;

    // Fixed drive wheel as the start point so the primary position is
    // commanded exactly; a light flywheel rides the secondary hinge.
    const GEARED_SCENE: &str = r#"
        [simulation]
        physics_dt = 0.001
        gravity = [0.0, 0.0, 0.0]
        max_steps = 3000

        [[bodies]]
        name = "frame"
        fixed = true

        [[bodies]]
        name = "drive"
        translation = [0.0, 0.0, 0.1]
        fixed = true

        [[bodies]]
        name = "wheel"
        translation = [0.0, 0.0, 0.2]
        mass = 0.1
        inertia = [0.01, 0.01, 0.01]

        [transmission]
        parent = "frame"
        end_point = "wheel"
        multiplier = 2.0
        coupling_stiffness = 5.0
        start_point = { body = "drive" }

        [transmission.parameters2]
        axis = [0.0, 0.0, 1.0]
        anchor = [0.0, 0.0, 0.2]
        damping_constant = 0.5
    "#;

    // -------------------------------------------------------------------
    // Full stack headless test
    // -------------------------------------------------------------------

    #[test]
    fn toml_scene_runs_and_holds_the_gear_ratio() {
        let mut scene = SceneBuilder::from_toml(GEARED_SCENE).unwrap().build().unwrap();
        let max_steps = scene.app.world().resource::<gearlink_core::config::SimConfig>().max_steps;

        {
            let joint = scene.joint().unwrap();
            assert_eq!(joint.phase(), JointPhase::Attached);
            assert_eq!(joint.gear_type(), GearType::ClassicGear);
        }

        scene
            .joint_mut()
            .unwrap()
            .set_position(FRAC_PI_4, AxisId::Axis1);
        scene.step_n(max_steps);

        let joint = scene.joint().unwrap();
        assert!((joint.position(AxisId::Axis1) - FRAC_PI_4).abs() < 1e-3);
        assert!(
            (joint.position(AxisId::Axis2) - FRAC_PI_2).abs() < 0.05,
            "axis2 settled at {} instead of {FRAC_PI_2}",
            joint.position(AxisId::Axis2)
        );

        let stats = scene.app.world().resource::<CouplingStats>();
        assert_eq!(stats.steps, u64::from(max_steps));
        assert!(stats.last_deviation.abs() < 0.05);
        assert!((stats.last_position2 - FRAC_PI_2).abs() < 0.05);
    }

    // -------------------------------------------------------------------
    // Reset semantics
    // -------------------------------------------------------------------

    #[test]
    fn reset_restores_initial_positions_and_reattach_recouples() {
        let mut scene = SceneBuilder::from_toml(GEARED_SCENE).unwrap().build().unwrap();

        scene
            .joint_mut()
            .unwrap()
            .set_position(FRAC_PI_4, AxisId::Axis1);
        scene.step_n(500);

        let entity = scene.joint;
        scene
            .app
            .world_mut()
            .resource_scope(|world, mut rapier: Mut<RapierWorld>| {
                let mut joint = world.get_mut::<TransmissionJoint>(entity).unwrap();
                joint.reset_physics(rapier.as_mut());
                rapier.reset_to_initial();
                joint.reset();
            });

        {
            let joint = scene.joint().unwrap();
            assert_eq!(joint.phase(), JointPhase::Detached);
            assert!(joint.position(AxisId::Axis1).abs() < f32::EPSILON);
            assert!(joint.position(AxisId::Axis2).abs() < f32::EPSILON);
        }

        scene
            .app
            .world_mut()
            .resource_scope(|world, mut rapier: Mut<RapierWorld>| {
                let mut joint = world.get_mut::<TransmissionJoint>(entity).unwrap();
                joint.attach(rapier.as_mut()).unwrap();
            });

        scene
            .joint_mut()
            .unwrap()
            .set_position(FRAC_PI_4, AxisId::Axis1);
        scene.step_n(3000);

        let joint = scene.joint().unwrap();
        assert_eq!(joint.gear_type(), GearType::ClassicGear);
        assert!((joint.position(AxisId::Axis2) - FRAC_PI_2).abs() < 0.05);
    }

    // -------------------------------------------------------------------
    // Save surface
    // -------------------------------------------------------------------

    #[test]
    fn save_round_trip_preserves_configured_fields() {
        let config = SceneConfig::from_toml(GEARED_SCENE).unwrap();
        let mut scene = SceneBuilder::new(config.clone()).build().unwrap();

        // Derived state (gear type, offsets, cached poses) must not leak
        // into the saved form, even after running.
        scene
            .joint_mut()
            .unwrap()
            .set_position(FRAC_PI_4, AxisId::Axis1);
        scene.step_n(200);

        let saved = scene.joint().unwrap().to_config();
        assert_eq!(saved, config.transmission);
    }
}

// End-to-end scenarios for the swarm simulation.
//
// Each test drives the real `Swarm` (or a single real `Agent`) through the
// public API and checks the externally visible outcome: the beam graph,
// agent snapshots, and the event stream.

use scaffold_sim::agent::{AgentBehavior, AgentState};
use scaffold_sim::command::SwarmCommand;
use scaffold_sim::event::SwarmEventKind;
use scaffold_sim::geometry;
use scaffold_sim::types::{AgentId, AgentKind, BeamAnnotation};
use scaffold_tests::{Scenario, Solo, config_with, v};

// ---------------------------------------------------------------------------
// Beam graph
// ---------------------------------------------------------------------------

#[test]
fn crossing_beams_share_a_joint() {
    let mut s = Scenario::quiet(config_with(1, 0, 0));
    let a = s.beam(v(0.0, 0.0, 0.0), v(0.0, 0.0, 10.0));
    let b = s.beam(v(0.0, -5.0, 5.0), v(0.0, 5.0, 5.0));
    let structure = s.swarm.structure();

    let on_a = structure.beam(a).unwrap().joint_at(v(0.0, 0.0, 5.0)).unwrap();
    let on_b = structure.beam(b).unwrap().joint_at(v(0.0, 0.0, 5.0)).unwrap();
    assert!(on_a.beams.contains(&b));
    assert!(on_b.beams.contains(&a));
    structure.check_joint_symmetry().unwrap();
}

#[test]
fn placed_beam_is_no_longer_available() {
    let mut s = Scenario::quiet(config_with(1, 0, 0));
    let (p1, p2) = (v(3.0, 4.0, 0.0), v(3.0, 4.0, 10.0));
    assert!(s.swarm.structure().available(p1, p2));
    s.beam(p1, p2);
    assert!(!s.swarm.structure().available(p1, p2));
    assert!(!s.swarm.structure().available(p2, p1));
}

#[test]
fn removed_beam_leaves_no_trace() {
    let mut s = Scenario::quiet(config_with(1, 0, 0));
    let a = s.beam(v(0.0, 0.0, 0.0), v(0.0, 0.0, 10.0));
    let b = s.beam(v(0.0, -5.0, 5.0), v(0.0, 5.0, 5.0));
    let removed = s.swarm.structure_mut().remove_beam(a, None).unwrap();
    let structure = s.swarm.structure();

    for i in 0..=20 {
        let p = removed.segment().point_at(i as f64 / 20.0);
        assert!(!structure.get_box(p).unwrap().contains(&a));
    }
    assert!(!structure.beam(b).unwrap().touches(a));
    structure.check_joint_symmetry().unwrap();
}

// ---------------------------------------------------------------------------
// Single agents
// ---------------------------------------------------------------------------

#[test]
fn grounded_agent_moves_within_one_step() {
    let mut solo = Solo::new(AgentKind::Builder, v(0.0, 0.0, 0.0));
    assert!(solo.agent.memory().ground_direction.is_none());
    solo.cycle();
    let location = solo.agent.location();
    assert!(geometry::distance(location, v(0.0, 0.0, 0.0)) <= 2.0 + geometry::EPSILON);
    assert!(solo.structure.in_bounds(location));
}

#[test]
fn overloaded_beam_triggers_repair_mode() {
    let mut solo = Solo::new(AgentKind::Repairer, v(20.0, 0.0, 10.0));
    let column = solo
        .structure
        .add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0)
        .unwrap()
        .beam;
    solo.agent
        .place(&mut solo.structure, v(20.0, 0.0, 10.0), Some(column))
        .unwrap();
    solo.agent.set_carried(&mut solo.structure, 2);
    solo.table.set_moment(column, 1_000.0);

    let events = solo.cycle();
    let state = solo.agent.current_state(&solo.structure);
    assert!(state.repair_mode);
    assert_eq!(state.broken_beam, Some(column));
    assert_eq!(state.state, AgentState::Repairing);
    assert!(events.contains(&SwarmEventKind::RepairStarted {
        agent: AgentId(0),
        beam: column
    }));
}

#[test]
fn repairer_props_up_an_overloaded_column() {
    let mut solo = Solo::new(AgentKind::Repairer, v(20.0, 0.0, 10.0));
    let column = solo
        .structure
        .add_beam(v(20.0, 0.0, 0.0), v(20.0, 0.0, 10.0), 1.0)
        .unwrap()
        .beam;
    solo.agent
        .place(&mut solo.structure, v(20.0, 0.0, 10.0), Some(column))
        .unwrap();
    solo.agent.set_carried(&mut solo.structure, 2);
    solo.table.set_moment(column, 1_000.0);

    let mut support = None;
    for _ in 0..20 {
        for event in solo.cycle() {
            if let SwarmEventKind::BeamPlaced {
                beam,
                support_for: Some(target),
                ..
            } = event
            {
                assert_eq!(target, column);
                support = Some(beam);
            }
        }
        if support.is_some() {
            break;
        }
    }
    let support = support.expect("a support should be placed");
    let beam = solo.structure.beam(support).unwrap();
    // Built from the column itself, partway down.
    assert!(geometry::distance_to_segment(
        &solo.structure.beam(column).unwrap().segment(),
        beam.start
    ) < geometry::EPSILON);
    assert!(beam.start.z < 10.0);
    assert!(beam.end.z > beam.start.z);
    assert_eq!(
        solo.structure.annotations().get(&support),
        Some(&BeamAnnotation::Support)
    );
    solo.structure.check_joint_symmetry().unwrap();
}

// ---------------------------------------------------------------------------
// Whole swarm
// ---------------------------------------------------------------------------

#[test]
fn same_seed_same_run() {
    let mut a = Scenario::lever_arm(config_with(7, 6, 2));
    let mut b = Scenario::lever_arm(config_with(7, 6, 2));
    a.run(150);
    b.run(150);
    assert_eq!(a.swarm.to_json().unwrap(), b.swarm.to_json().unwrap());
    assert_eq!(a.events.len(), b.events.len());
}

#[test]
fn long_run_keeps_the_graph_consistent() {
    let mut s = Scenario::lever_arm(config_with(3, 8, 2));
    s.run(300);
    let structure = s.swarm.structure();

    assert!(structure.beam_count() > 0);
    assert_eq!(
        s.count(|k| matches!(k, SwarmEventKind::BeamPlaced { .. })),
        structure.beam_count()
    );
    structure.check_joint_symmetry().unwrap();
    for beam in structure.beams() {
        assert!(beam.load >= 0.0);
        assert!(structure.in_bounds(beam.start) && structure.in_bounds(beam.end));
    }
    for agent in s.swarm.agents() {
        assert!(structure.in_bounds(agent.location()));
        if let Some(beam) = agent.beam() {
            let segment = structure.beam(beam).unwrap().segment();
            assert!(geometry::distance_to_segment(&segment, agent.location()) < 1e-3);
        }
    }
}

#[test]
fn population_commands_round_trip() {
    let mut s = Scenario::quiet(config_with(5, 3, 0));
    s.run(5);

    let events = s.step_with(&[
        SwarmCommand::AddAgents {
            kind: AgentKind::Repairer,
            count: 2,
        },
        SwarmCommand::RemoveAgent { id: AgentId(0) },
    ]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e.kind, SwarmEventKind::AgentAdded { .. }))
            .count(),
        2
    );
    assert_eq!(s.agent_ids(), vec![AgentId(1), AgentId(2), AgentId(3), AgentId(4)]);

    s.step_with(&[SwarmCommand::RemoveAgents { count: 1 }]);
    assert_eq!(s.agent_ids(), vec![AgentId(1), AgentId(2), AgentId(3)]);

    // Unknown ids are logged and skipped; the step still runs.
    s.step_with(&[SwarmCommand::RemoveAgent { id: AgentId(0) }]);
    assert_eq!(s.swarm.agent_count(), 3);

    s.step_with(&[SwarmCommand::Reset]);
    assert_eq!(s.agent_ids(), vec![AgentId(5), AgentId(6), AgentId(7)]);
    let home = &s.swarm.config().home;
    assert!(s.swarm.agents().all(|a| home.contains(a.location())));
}

#[test]
fn snapshot_json_exposes_agents_and_beams() {
    let mut s = Scenario::quiet(config_with(2, 2, 0));
    s.beam(v(1.0, 1.0, 0.0), v(1.0, 1.0, 10.0));
    s.run(3);
    let json = s.swarm.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["timestep"], 3);
    assert_eq!(value["agents"].as_array().unwrap().len(), 2);
    assert_eq!(value["beams"].as_array().unwrap().len(), 1);
    assert_eq!(value["beams"][0]["end"][2], 10.0);
}

use beatrig_core::color::{RgbColor, WheelColor};
use beatrig_core::fixture::{
    ColorChannels, Fixture, FixtureLayout, MovementChannels, NamedValue, ShutterOption,
    WheelChannels,
};
use beatrig_core::group::{validate_universe_layout, GroupFixture, LightsGroup};
use proptest::prelude::*;

fn rgbwauv_par() -> Fixture {
    Fixture::new(
        "RGBWAUV Par",
        1,
        2,
        FixtureLayout::Par {
            color: ColorChannels {
                cold_white: Some(6),
                warm_white: Some(7),
                amber: Some(8),
                uv: Some(9),
                ..ColorChannels::rgb(3, 4, 5)
            },
        },
    )
    .unwrap()
    .with_shutter_option(ShutterOption::Open, 10)
    .with_shutter_option(ShutterOption::Strobe, 200)
}

fn rgb_moving_head() -> Fixture {
    Fixture::new(
        "Beam",
        7,
        8,
        FixtureLayout::MovingHeadRgb {
            color: ColorChannels::rgb(9, 10, 11),
            movement: MovementChannels {
                pan: 1,
                fine_pan: Some(2),
                tilt: 3,
                fine_tilt: Some(4),
                moving_speed: Some(5),
            },
        },
    )
    .unwrap()
    .with_shutter_option(ShutterOption::Open, 255)
    .with_shutter_option(ShutterOption::Strobe, 128)
}

fn wheel_moving_head() -> Fixture {
    Fixture::new(
        "Spot",
        6,
        7,
        FixtureLayout::MovingHeadWheel {
            wheel: WheelChannels {
                color_wheel: 8,
                color_wheel_values: vec![
                    NamedValue {
                        name: WheelColor::White,
                        value: 0,
                    },
                    NamedValue {
                        name: WheelColor::Pink,
                        value: 40,
                    },
                    NamedValue {
                        name: WheelColor::Blue,
                        value: 56,
                    },
                ],
                gobo_wheel: 9,
                gobo_wheel_values: vec![
                    NamedValue {
                        name: "open".to_string(),
                        value: 0,
                    },
                    NamedValue {
                        name: "dots".to_string(),
                        value: 24,
                    },
                ],
                gobo_rotate: None,
                gobo_rotate_values: vec![],
            },
            movement: MovementChannels {
                pan: 1,
                fine_pan: Some(2),
                tilt: 3,
                fine_tilt: Some(4),
                moving_speed: Some(5),
            },
        },
    )
    .unwrap()
    .with_shutter_option(ShutterOption::Open, 255)
}

#[test]
fn test_pink_par_round_trip() {
    let mut par = rgbwauv_par();
    par.set_master_dimmer(255);
    par.set_color(RgbColor::Pink);
    par.set_shutter(ShutterOption::Open);

    let dmx = par.to_dmx();
    assert_eq!(par.decode_dmx(&dmx), *par.state());
}

#[test]
fn test_wheel_head_round_trip() {
    let mut head = wheel_moving_head();
    head.set_master_dimmer(255);
    head.set_color(RgbColor::Lightpink);
    head.set_gobo(Some("dots"));
    head.set_movement(0x8000, 0x4000);

    let state = head.state().clone();
    assert_eq!(state.wheel_color, Some(WheelColor::Pink));
    assert_eq!(state.gobo.as_deref(), Some("dots"));

    let dmx = head.to_dmx();
    assert_eq!(dmx[7], 40);
    assert_eq!(dmx[8], 24);
    assert_eq!(head.decode_dmx(&dmx), state);
}

#[test]
fn test_unknown_gobo_ignored() {
    let mut head = wheel_moving_head();
    head.set_gobo(Some("dots"));
    head.set_gobo(Some("flames"));
    assert_eq!(head.state().gobo.as_deref(), Some("dots"));
    head.set_gobo(None);
    assert!(head.state().gobo.is_none());
}

#[test]
fn test_fixture_layout_from_json() {
    let json = r#"{
        "name": "Cheap par",
        "master_dim_channel": 1,
        "shutter_channel": 2,
        "shutter_options": { "open": 0, "strobe": 250 },
        "layout": {
            "type": "par",
            "color": { "red": 3, "green": 4, "blue": 5 }
        }
    }"#;
    let mut par: Fixture = serde_json::from_str(json).unwrap();
    par.validate().unwrap();
    par.set_shutter(ShutterOption::Strobe);
    assert_eq!(par.to_dmx()[1], 250);
}

#[test]
fn test_rig_overlap_rejected() {
    let mut group = LightsGroup::new(1, "Front", 1);
    group.pars.push(GroupFixture {
        id: 1,
        first_channel: 1,
        position_x: 0.0,
        position_y: 0.0,
        fixture: rgbwauv_par(),
    });
    group.moving_head_rgbs.push(GroupFixture {
        id: 2,
        first_channel: 9,
        position_x: 1.0,
        position_y: 0.0,
        fixture: rgb_moving_head(),
    });
    assert!(validate_universe_layout([&group]).is_err());

    group.moving_head_rgbs[0].first_channel = 17;
    assert!(validate_universe_layout([&group]).is_ok());
}

proptest! {
    #[test]
    fn prop_rgb_head_round_trip(
        dimmer in any::<u8>(),
        color in prop::sample::select(RgbColor::ALL.to_vec()),
        strobe in any::<bool>(),
        pan in any::<u16>(),
        tilt in any::<u16>(),
        speed in any::<u8>(),
    ) {
        let mut head = rgb_moving_head();
        head.set_master_dimmer(dimmer);
        head.set_color(color);
        head.set_shutter(if strobe { ShutterOption::Strobe } else { ShutterOption::Open });
        head.set_movement(pan, tilt);
        head.set_moving_speed(speed);

        let dmx = head.to_dmx();
        prop_assert_eq!(head.decode_dmx(&dmx), head.state().clone());
    }
}

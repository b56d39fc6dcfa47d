use simlink::{DataDefinition, define_data};

define_data! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Altitude {
        #[sim("PLANE ALTITUDE", "feet")]
        pub feet: f64,
        #[sim("INDICATED ALTITUDE", "feet")]
        pub indicated: f32,
    }
}

fn main() {
    let layout = Altitude::layout().unwrap();
    assert_eq!(layout.field_count(), 2);
    assert_eq!(layout.size, 12);
}

use simlink::{DataDefinition, define_data};

define_data! {
    /// Aircraft identity plus local bookkeeping.
    #[derive(Debug, Clone)]
    pub struct Identity {
        #[sim("TITLE")]
        pub title: [u8; 256],
        #[sim("ATC ID")]
        pub tail_number: String,
        #[sim("NUMBER OF ENGINES", "number")]
        pub engines: i32,
        #[sim("SIM ON GROUND", "bool")]
        pub on_ground: bool,
        #[sim("ZULU TIME", "seconds",)]
        pub zulu: f64,
        pub seen: u64,
        last_error: Option<String>,
    }
}

fn main() {
    let shape = Identity::shape();
    assert_eq!(shape.fields.len(), 7);
    assert_eq!(shape.tagged_count(), 5);

    let layout = Identity::layout().unwrap();
    assert_eq!(layout.field_count(), 5);
}

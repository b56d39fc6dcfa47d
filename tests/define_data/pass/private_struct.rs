use simlink::define_data;

define_data! {
    struct Heading {
        #[sim("PLANE HEADING DEGREES TRUE", "degrees")]
        true_heading: f64,
        #[sim("PLANE HEADING DEGREES MAGNETIC", "degrees")]
        magnetic_heading: f64,
    }
}

fn main() {
    let heading = Heading { true_heading: 90.0, magnetic_heading: 74.5 };
    assert!(heading.true_heading > heading.magnetic_heading);
}

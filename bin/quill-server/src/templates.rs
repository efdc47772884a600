//! Page templates, compiled into the binary.

use minijinja::Environment;

const TEMPLATES: [(&str, &str); 6] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("emotion.html", include_str!("../templates/emotion.html")),
    ("grammar.html", include_str!("../templates/grammar.html")),
    ("assistant.html", include_str!("../templates/assistant.html")),
    ("image.html", include_str!("../templates/image.html")),
];

/// Build the template environment. HTML autoescaping is on for every page.
pub fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    for (name, source) in TEMPLATES {
        env.add_template(name, source)?;
    }
    Ok(env)
}

#[cfg(test)]
mod test {
    use minijinja::context;

    use super::*;

    #[test]
    fn all_templates_compile() {
        let env = environment().unwrap();
        for (name, _) in TEMPLATES {
            assert!(env.get_template(name).is_ok(), "{name} missing");
        }
    }

    #[test]
    fn user_text_is_escaped() {
        let env = environment().unwrap();
        let html = env
            .get_template("grammar.html")
            .unwrap()
            .render(context! {
                text => "<script>alert(1)</script>",
                model_id => "m",
                busy_label => "Correcting...",
            })
            .unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}

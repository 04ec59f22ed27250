use std::collections::BTreeSet;

// "tomato" matches "tomatoes, diced" and vice versa.
fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn normalize(ingredient: &str) -> String {
    ingredient.trim().to_lowercase()
}

pub fn match_ingredients(user_ingredients: &[String], recipe_ingredients: &[String]) -> BTreeSet<String> {
    let mut matched = BTreeSet::new();

    for user in user_ingredients {
        let user = normalize(user);
        if user.is_empty() {
            continue;
        }
        if recipe_ingredients
            .iter()
            .any(|recipe| contains_either(&user, &normalize(recipe)))
        {
            matched.insert(user);
        }
    }

    matched
}

// Keeps the recipe's original extraction order.
pub fn missing_ingredients(user_ingredients: &[String], recipe_ingredients: &[String]) -> Vec<String> {
    let matched = match_ingredients(user_ingredients, recipe_ingredients);

    recipe_ingredients
        .iter()
        .filter(|recipe| {
            let recipe = normalize(recipe);
            !matched.iter().any(|user| contains_either(user, &recipe))
        })
        .cloned()
        .collect()
}

use rand::seq::SliceRandom;
use rand::Rng;

static DISHES: &[&str] = &[
    "pizza_margherita", "lasagna", "carbonara", "risotto", "tiramisu", "cannoli",
    "gnocchi", "parmigiana", "bruschetta", "polenta", "ossobuco", "minestrone", "pesto",
    "focaccia", "arancini", "gelato", "panettone", "prosciutto", "mozzarella", "ravioli",
    "tortellini", "panna_cotta", "calzone", "caprese", "stracciatella", "tagliatelle",
    "bolognese", "amaretto", "biscotti", "ciabatta", "fettuccine", "limoncello",
    "mascarpone", "mortadella", "pancetta", "pecorino", "polpette", "ricotta", "salame",
    "sfogliatella", "torrone", "zeppole", "bagna_cauda", "cacciucco", "caponata",
    "cassata", "crostata", "frittata", "grissini", "involtini", "melanzane", "orecchiette",
    "pandoro", "pastiera", "saltimbocca", "supplì", "zabaione", "agnolotti",
    "baci_di_dama", "burrata", "cicchetti", "cotoletta", "fiorentina", "gorgonzola",
    "malfatti", "panzerotti", "piadina", "porchetta", "sbrisolona", "taralli",
    "vitello_tonnato",
];

/// Random player handle: an Italian dish followed by a two digit number
pub fn generate<R: Rng>(rng: &mut R) -> String {
    let dish = DISHES.choose(rng).copied().unwrap_or("pizza_margherita");
    format!("{}{}", dish, rng.gen_range(10..100))
}
